//! Time-delay embedding into phase space.

use ndarray::Array2;
use sonoloc_core::SignalError;

/// Number of embedded points for a signal of `len` samples.
#[must_use]
pub fn embedded_len(len: usize, dim: usize, lag: usize) -> usize {
    len.saturating_sub((dim.saturating_sub(1)) * lag)
}

/// Embeds `signal` into `dim`-dimensional phase space with delay `lag`.
///
/// Row `i` is `[x[i], x[i + lag], ..., x[i + (dim - 1) * lag]]`, giving
/// `len - (dim - 1) * lag` rows.
///
/// # Errors
///
/// Returns [`SignalError::InsufficientSamples`] if not even one point can be
/// formed.
pub fn delay_embed(signal: &[f64], dim: usize, lag: usize) -> Result<Array2<f64>, SignalError> {
    let span = dim.saturating_sub(1) * lag;
    let rows = embedded_len(signal.len(), dim, lag);
    if dim == 0 || rows == 0 {
        return Err(SignalError::InsufficientSamples {
            required: span + 1,
            available: signal.len(),
        });
    }
    Ok(Array2::from_shape_fn((rows, dim), |(i, d)| signal[i + d * lag]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_rows() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let e = delay_embed(&x, 3, 1).unwrap();
        assert_eq!(e.dim(), (3, 3));
        assert_eq!(e.row(0).to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(e.row(2).to_vec(), vec![3.0, 4.0, 5.0]);

        let e = delay_embed(&x, 2, 2).unwrap();
        assert_eq!(e.dim(), (3, 2));
        assert_eq!(e.row(1).to_vec(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_embedding_too_short() {
        assert!(matches!(
            delay_embed(&[1.0, 2.0], 3, 1),
            Err(SignalError::InsufficientSamples {
                required: 3,
                available: 2
            })
        ));
    }
}
