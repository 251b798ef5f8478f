use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Severity {
    /// Something about the program that might be unintended (eg. advice that never applies)
    Lint,
    Warning,

    /// A declaration or type could not be woven
    Error,
}

/// Where in the input a diagnostic comes from
///
/// Every part is optional since diagnostics can be about a declaration, a class, a member, or a
/// single instruction.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct SourceLocation {
    /// Class, as a binary name
    pub class: Option<String>,

    /// Name from the `SourceFile` attribute
    pub source_file: Option<String>,

    /// Member, as `name` followed by its descriptor
    pub member: Option<String>,

    pub line: Option<u16>,
}

impl SourceLocation {
    pub fn class(class: impl Into<String>) -> SourceLocation {
        SourceLocation {
            class: Some(class.into()),
            ..SourceLocation::default()
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.class.is_none() && self.source_file.is_none() && self.member.is_none()
    }
}

/// `File.java:12 (a/b/C.run()V)`, degrading gracefully when parts are missing
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote_file = false;
        if let Some(file) = &self.source_file {
            f.write_str(file)?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
            wrote_file = true;
        }
        let described = match (&self.class, &self.member) {
            (Some(class), Some(member)) => Some(format!("{}.{}", class, member)),
            (Some(class), None) => Some(class.clone()),
            (None, Some(member)) => Some(member.clone()),
            (None, None) => None,
        };
        match (described, wrote_file) {
            (Some(described), true) => write!(f, " ({})", described),
            (Some(described), false) => f.write_str(&described),
            (None, true) => Ok(()),
            (None, false) => f.write_str("<unknown>"),
        }
    }
}

/// Problem found while weaving
///
/// Weaving never fails outright: anything that goes wrong with a declaration or a type is
/// reported this way and the rest of the work carries on.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, location: SourceLocation) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            location,
        }
    }

    pub fn warning(message: impl Into<String>, location: SourceLocation) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            location,
        }
    }

    pub fn lint(message: impl Into<String>, location: SourceLocation) -> Diagnostic {
        Diagnostic {
            severity: Severity::Lint,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Lint => "lint",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        if self.location.is_unknown() {
            write!(f, "{}: {}", severity, self.message)
        } else {
            write!(f, "{}: {}: {}", self.location, severity, self.message)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render_locations() {
        let mut location = SourceLocation::class("a/B");
        assert_eq!(location.to_string(), "a/B");
        location.member = Some(String::from("run()V"));
        location.source_file = Some(String::from("B.java"));
        location.line = Some(12);
        assert_eq!(location.to_string(), "B.java:12 (a/B.run()V)");
        assert_eq!(SourceLocation::default().to_string(), "<unknown>");

        let diagnostic = Diagnostic::error("circular precedence", location);
        assert_eq!(
            diagnostic.to_string(),
            "B.java:12 (a/B.run()V): error: circular precedence"
        );
    }
}
