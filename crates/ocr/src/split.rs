use image::DynamicImage;

use crate::config::SplitPolicy;
use crate::preprocess::{ensure_readable, UnreadableImageError};
use crate::types::ReceiptPart;

/// Divide a scan into the receipts it holds.
///
/// Pump printers often emit two copies side by side on one wide strip, so a
/// landscape scan is cut at the horizontal midpoint into left and right
/// halves (left first, left keeps the odd column). Anything else comes back
/// whole.
pub fn split(
    img: DynamicImage,
    policy: SplitPolicy,
) -> Result<Vec<(ReceiptPart, DynamicImage)>, UnreadableImageError> {
    ensure_readable(&img)?;

    let (width, height) = (img.width(), img.height());
    let wanted = match policy {
        SplitPolicy::AspectRatio => width > height,
        SplitPolicy::Always => width >= 2,
    };
    if !wanted {
        return Ok(vec![(ReceiptPart::Whole, img)]);
    }

    let right_width = width / 2;
    let left_width = width - right_width;
    let left = img.crop_imm(0, 0, left_width, height);
    let right = img.crop_imm(left_width, 0, right_width, height);
    Ok(vec![(ReceiptPart::Left, left), (ReceiptPart::Right, right)])
}
