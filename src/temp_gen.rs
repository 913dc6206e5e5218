use crate::tac::Temporary;

/// Hands out `t0, t1, ...`; one per function, never reused within it.
pub(crate) struct TempGenerator {
    next: usize,
}

impl TempGenerator {
    pub(crate) fn new() -> Self {
        TempGenerator { next: 0 }
    }

    pub(crate) fn next(&mut self) -> Temporary {
        let t = Temporary(self.next);
        self.next += 1;
        t
    }

    /// How many temporaries have been handed out so far
    pub(crate) fn count(&self) -> usize {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive() {
        let mut temps = TempGenerator::new();
        assert_eq!(temps.next(), Temporary(0));
        assert_eq!(temps.next(), Temporary(1));
        assert_eq!(temps.next().to_string(), "t2");
        assert_eq!(temps.count(), 3);
    }
}
