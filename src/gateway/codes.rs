//! Processor response-code table
//!
//! The processor reports the outcome of every attempt as a two-digit
//! string. `"00"` is the only success code; everything else is a
//! failure whose code is preserved verbatim for diagnostics.

/// The one response code that marks a successful payment
pub const SUCCESS_CODE: &str = "00";

/// Human-readable description for a processor response code.
/// Unrecognized codes fall back to the default entry.
pub fn describe(code: &str) -> &'static str {
    match code {
        "00" => "Transaction successful",
        "07" => "Amount deducted, transaction flagged as suspicious",
        "09" => "Card or account not registered for online banking",
        "10" => "Authentication failed more than 3 times",
        "11" => "Payment window expired",
        "12" => "Card or account is locked",
        "13" => "Incorrect one-time password",
        "24" => "Transaction cancelled by the customer",
        "51" => "Insufficient funds",
        "65" => "Daily transaction limit exceeded",
        "75" => "Issuing bank is under maintenance",
        "79" => "Incorrect payment password entered too many times",
        _ => "Unknown error",
    }
}

/// True iff `code` marks a successful payment
pub fn is_success(code: &str) -> bool {
    code == SUCCESS_CODE
}
