//! Regex patterns for invoice boundary detection.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Invoice-number-like token adjacent to a header keyword, e.g.
    /// "Invoice #A100", "Invoice No: 2024-017", "INV # 44/2024".
    pub static ref INVOICE_NUMBER_HEADER: Regex = Regex::new(
        r"(?i)(?:invoice|inv\.?)\s*(?:#|no\.?|number|num\.?)?\s*[:.]?\s*([A-Z0-9][A-Z0-9/\-_.]*\d[A-Z0-9/\-_.]*|[A-Z0-9]*\d[A-Z0-9/\-_.]*)"
    ).unwrap();

    /// Tokens that look like dates; excluded so "Invoice date: 2024-01-15"
    /// does not read as an invoice number.
    pub static ref DATE_LIKE: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}$|^\d{1,2}[./]\d{1,2}[./]\d{2,4}$"
    ).unwrap();
}

/// First invoice-number-like token on a page, if any. When conflicting
/// tokens appear mid-page, the first detected token wins for boundary
/// purposes.
pub fn detect_invoice_number(page_text: &str) -> Option<String> {
    for caps in INVOICE_NUMBER_HEADER.captures_iter(page_text) {
        let token = caps[1].trim_end_matches(['.', ':']).to_string();
        if token.is_empty() || DATE_LIKE.is_match(&token) {
            continue;
        }
        return Some(token.to_uppercase());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_hash_marker() {
        assert_eq!(
            detect_invoice_number("ACME Corp\nInvoice #A100\nDate: 2024-01-15"),
            Some("A100".to_string())
        );
    }

    #[test]
    fn detects_labeled_number() {
        assert_eq!(
            detect_invoice_number("Invoice No: 2024-017"),
            Some("2024-017".to_string())
        );
        assert_eq!(
            detect_invoice_number("INV # 44/2024"),
            Some("44/2024".to_string())
        );
    }

    #[test]
    fn first_token_wins_mid_page() {
        let text = "Invoice #B200\nsee also invoice #C300";
        assert_eq!(detect_invoice_number(text), Some("B200".to_string()));
    }

    #[test]
    fn ignores_date_like_tokens() {
        assert_eq!(detect_invoice_number("Invoice 2024-01-15"), None);
    }

    #[test]
    fn no_marker_yields_none() {
        assert_eq!(detect_invoice_number("Thank you for your business"), None);
        assert_eq!(detect_invoice_number(""), None);
    }
}
