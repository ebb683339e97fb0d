// ABOUTME: The fatal-error taxonomy shared by the reader, evaluator, and driver

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LispError {
    // ===== Reader errors =====
    #[error("unterminated string")]
    UnterminatedString,

    #[error("unknown escape: \\{0}")]
    UnknownEscape(char),

    #[error("integer literal out of range")]
    IntegerOverflow,

    #[error("symbol too long")]
    SymbolTooLong,

    #[error("unexpected character: '{0}'")]
    UnexpectedChar(char),

    #[error("expected ')'")]
    ExpectedCloseParen,

    #[error("'.' outside a list")]
    DotOutsideList,

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected trailing input")]
    TrailingInput,

    // ===== Binding errors =====
    #[error("undefined symbol: {0}")]
    UndefinedSymbol(String),

    #[error("{0} is already defined")]
    Redefined(String),

    #[error("can't assign to {0}")]
    InvalidPlace(String),

    // ===== Application errors =====
    #[error("{function}: expected {expected} argument{}, got {actual}", if *.expected == "1" { "" } else { "s" })]
    ArityError {
        function: String,
        expected: String, // "2", "at least 1"
        actual: usize,
    },

    #[error("not a function: {0}")]
    NotCallable(String),

    #[error("can't call a macro at runtime: {0}")]
    MacroAtRuntime(String),

    /// Malformed use of a special form, e.g. `(quote)` or `(def 1 2)`.
    #[error("{form}: {message}")]
    BadForm { form: &'static str, message: String },

    // ===== Numeric errors =====
    #[error("division by zero")]
    DivisionByZero,

    // ===== I/O errors =====
    #[error("can't load {path}: {message}")]
    Load { path: String, message: String },
}

impl LispError {
    /// Create an arity error with expected and actual counts
    pub fn arity(function: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        LispError::ArityError {
            function: function.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Create a malformed-special-form error
    pub fn form(form: &'static str, message: impl Into<String>) -> Self {
        LispError::BadForm {
            form,
            message: message.into(),
        }
    }
}
