use image::RgbaImage;
use image::imageops;

/// Non-destructive rotation/mirror state applied at display time.
///
/// The eight variants are the dihedral group of the square, named after the
/// EXIF orientation values. The current picture carries one of these instead
/// of re-decoded pixels; rotating twice costs two enum transitions, not two
/// image transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    /// Rotated 90 degrees clockwise.
    Rotate90,
    Rotate180,
    /// Rotated 270 degrees clockwise.
    Rotate270,
    FlipHorizontal,
    FlipVertical,
    /// Flipped along the top-left/bottom-right diagonal (EXIF 5).
    Transpose,
    /// Flipped along the top-right/bottom-left diagonal (EXIF 7).
    Transverse,
}

impl Orientation {
    /// Decomposition into (mirrored horizontally first, then quarter turns
    /// clockwise). The composition rules below are derived from
    /// `mirror . rotate^r . mirror = rotate^-r`.
    fn parts(self) -> (bool, u8) {
        match self {
            Self::Normal => (false, 0),
            Self::Rotate90 => (false, 1),
            Self::Rotate180 => (false, 2),
            Self::Rotate270 => (false, 3),
            Self::FlipHorizontal => (true, 0),
            Self::Transverse => (true, 1),
            Self::FlipVertical => (true, 2),
            Self::Transpose => (true, 3),
        }
    }

    fn from_parts(mirrored: bool, turns: u8) -> Self {
        match (mirrored, turns % 4) {
            (false, 0) => Self::Normal,
            (false, 1) => Self::Rotate90,
            (false, 2) => Self::Rotate180,
            (false, _) => Self::Rotate270,
            (true, 0) => Self::FlipHorizontal,
            (true, 1) => Self::Transverse,
            (true, 2) => Self::FlipVertical,
            (true, _) => Self::Transpose,
        }
    }

    /// The displayed image rotated a further 90 degrees clockwise.
    #[must_use]
    pub fn rotated_cw(self) -> Self {
        let (mirrored, turns) = self.parts();
        Self::from_parts(mirrored, turns + 1)
    }

    /// The displayed image rotated a further 90 degrees counter-clockwise.
    #[must_use]
    pub fn rotated_ccw(self) -> Self {
        let (mirrored, turns) = self.parts();
        Self::from_parts(mirrored, turns + 3)
    }

    /// The displayed image mirrored left-to-right.
    #[must_use]
    pub fn flipped_horizontal(self) -> Self {
        let (mirrored, turns) = self.parts();
        Self::from_parts(!mirrored, 4 - turns)
    }

    /// The displayed image mirrored top-to-bottom.
    #[must_use]
    pub fn flipped_vertical(self) -> Self {
        let (mirrored, turns) = self.parts();
        Self::from_parts(!mirrored, 6 - turns)
    }

    /// Whether rendering under this orientation swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        self.parts().1 % 2 == 1
    }

    /// Maps an EXIF orientation tag value; unknown values read as `Normal`.
    pub fn from_exif(value: u16) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    /// Bakes the orientation into a pixel buffer. This is for the rendering
    /// collaborator (or an explicit export); the picture manager itself never
    /// rewrites stored pixels.
    pub fn apply(self, image: &RgbaImage) -> RgbaImage {
        let (mirrored, turns) = self.parts();
        let base = if mirrored {
            imageops::flip_horizontal(image)
        } else {
            image.clone()
        };
        match turns {
            1 => imageops::rotate90(&base),
            2 => imageops::rotate180(&base),
            3 => imageops::rotate270(&base),
            _ => base,
        }
    }
}
