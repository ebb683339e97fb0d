// ABOUTME: rustyline helper that keeps reading while a form is still open

use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::Helper;

/// REPL helper: input with unbalanced parentheses continues on the next
/// line instead of being handed to the reader.
pub struct LispHelper;

impl LispHelper {
    pub fn new() -> Self {
        LispHelper
    }
}

impl Default for LispHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for LispHelper {}

impl Completer for LispHelper {
    type Candidate = String;
}

impl Hinter for LispHelper {
    type Hint = String;
}

impl Highlighter for LispHelper {}

impl Validator for LispHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        Ok(validate_balance(ctx.input()))
    }
}

/// Count open parentheses outside strings and comments.
fn validate_balance(input: &str) -> ValidationResult {
    let mut depth: i32 = 0;
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '"' => {
                // skip string contents, honoring escapes
                let mut closed = false;
                while let Some(sc) = chars.next() {
                    match sc {
                        '\\' => {
                            chars.next();
                        }
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return ValidationResult::Incomplete;
                }
            }
            ';' => {
                for sc in chars.by_ref() {
                    if sc == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        ValidationResult::Incomplete
    } else {
        ValidationResult::Valid(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_input_is_valid() {
        assert!(matches!(
            validate_balance("(+ 1 2)"),
            ValidationResult::Valid(None)
        ));
        assert!(matches!(validate_balance("42"), ValidationResult::Valid(None)));
    }

    #[test]
    fn test_open_form_is_incomplete() {
        assert!(matches!(
            validate_balance("(def f (x)"),
            ValidationResult::Incomplete
        ));
        assert!(matches!(
            validate_balance("\"open string"),
            ValidationResult::Incomplete
        ));
    }

    #[test]
    fn test_parens_in_strings_and_comments_ignored() {
        assert!(matches!(
            validate_balance("\"(((\""),
            ValidationResult::Valid(None)
        ));
        assert!(matches!(
            validate_balance("(+ 1 2) ; (open"),
            ValidationResult::Valid(None)
        ));
    }
}
