use ndarray::{Array2, Zip};

use crate::error::{LoadError, Result};
use crate::frame::{ImageStack, Pixel, ReferenceFrame};

/// Mean over axis 0 of an (N, H, W) stack, in float64 whatever the input type.
pub fn mean_frame<T: Pixel>(stack: &ImageStack<T>) -> Result<ReferenceFrame> {
    let (n, h, w) = stack.dim();
    if n == 0 {
        return Err(LoadError::EmptyStack);
    }

    let mut sum = Array2::<f64>::zeros((h, w));

    for frame in stack.outer_iter() {
        Zip::from(&mut sum)
            .and(&frame)
            .for_each(|s, &v| *s += v.to_f64());
    }

    sum /= n as f64;

    Ok(sum)
}

/// Minimum, maximum and mean of every element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// `None` for an empty array.
pub fn stats<'a, T, I>(values: I) -> Option<Stats>
where
    T: Pixel,
    I: IntoIterator<Item = &'a T>,
{
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        let v = (*v).to_f64();
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    (count > 0).then(|| Stats {
        min,
        max,
        mean: sum / count as f64,
    })
}
