use std::ops::Not;

/// Outcome of matching a pointcut against a shadow
///
/// `Yes` and `No` are decided statically. `Maybe` is decided at runtime by a residual test.
/// `Never` is a stronger `No` which fast matching uses to say that no shadow of the given shape
/// can ever match, whatever the runtime values. Full matching never produces it.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MatchValue {
    Yes,
    No,
    Maybe,
    Never,
}

impl MatchValue {
    pub const ALL: [MatchValue; 4] = [
        MatchValue::Yes,
        MatchValue::No,
        MatchValue::Maybe,
        MatchValue::Never,
    ];

    pub fn from_bool(value: bool) -> MatchValue {
        if value {
            MatchValue::Yes
        } else {
            MatchValue::No
        }
    }

    /// Conjunction
    ///
    /// | and   | Yes   | No    | Maybe | Never |
    /// |-------|-------|-------|-------|-------|
    /// | Yes   | Yes   | No    | Maybe | Never |
    /// | No    | No    | No    | No    | Never |
    /// | Maybe | Maybe | No    | Maybe | Never |
    /// | Never | Never | Never | Never | Never |
    pub fn and(self, other: MatchValue) -> MatchValue {
        use MatchValue::*;
        match (self, other) {
            (Never, _) | (_, Never) => Never,
            (No, _) | (_, No) => No,
            (Maybe, _) | (_, Maybe) => Maybe,
            (Yes, Yes) => Yes,
        }
    }

    /// Disjunction
    ///
    /// | or    | Yes   | No    | Maybe | Never |
    /// |-------|-------|-------|-------|-------|
    /// | Yes   | Yes   | Yes   | Yes   | Yes   |
    /// | No    | Yes   | No    | Maybe | No    |
    /// | Maybe | Yes   | Maybe | Maybe | Maybe |
    /// | Never | Yes   | No    | Maybe | Never |
    pub fn or(self, other: MatchValue) -> MatchValue {
        use MatchValue::*;
        match (self, other) {
            (Yes, _) | (_, Yes) => Yes,
            (Maybe, _) | (_, Maybe) => Maybe,
            (No, _) | (_, No) => No,
            (Never, Never) => Never,
        }
    }

    /// Negation
    ///
    /// Something that can never match has a negation that always matches.
    pub fn negate(self) -> MatchValue {
        match self {
            MatchValue::Yes => MatchValue::No,
            MatchValue::No => MatchValue::Yes,
            MatchValue::Maybe => MatchValue::Maybe,
            MatchValue::Never => MatchValue::Yes,
        }
    }

    /// Statically known to hold
    pub fn always_true(self) -> bool {
        self == MatchValue::Yes
    }

    /// Statically known not to hold
    pub fn always_false(self) -> bool {
        matches!(self, MatchValue::No | MatchValue::Never)
    }

    pub fn maybe_true(self) -> bool {
        !self.always_false()
    }
}

impl Not for MatchValue {
    type Output = MatchValue;

    fn not(self) -> MatchValue {
        self.negate()
    }
}
