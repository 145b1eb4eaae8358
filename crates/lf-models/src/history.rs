//! Fixed-length history of past scalar samples.

/// Shift register holding the `N` most recent committed values, newest first.
///
/// `push` is the commit step: it runs only after a new value has been fully
/// computed, dropping the oldest slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftRegister<const N: usize> {
    values: [f64; N],
}

impl<const N: usize> ShiftRegister<N> {
    pub fn new(values: [f64; N]) -> Self {
        Self { values }
    }

    /// Value `lag` commits ago (0 = most recent).
    ///
    /// # Panics
    ///
    /// Panics if `lag >= N`.
    pub fn lag(&self, lag: usize) -> f64 {
        self.values[lag]
    }

    pub fn push(&mut self, value: f64) {
        if N == 0 {
            return;
        }
        self.values.rotate_right(1);
        self.values[0] = value;
    }

    pub fn as_array(&self) -> [f64; N] {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_shifts_oldest_out() {
        let mut reg = ShiftRegister::new([1.0, 2.0, 3.0]);
        reg.push(0.5);
        assert_eq!(reg.as_array(), [0.5, 1.0, 2.0]);
        reg.push(0.25);
        assert_eq!(reg.lag(0), 0.25);
        assert_eq!(reg.lag(2), 1.0);
    }
}
