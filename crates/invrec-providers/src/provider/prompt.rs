//! Shared extraction prompt and response parsing for LLM-backed providers.

use crate::error::ProviderError;
use crate::types::RawExtraction;

/// Instruction prepended to the invoice text for every LLM provider.
pub const EXTRACTION_PROMPT: &str = r#"You are an invoice data extraction service. Extract structured data from the supplier invoice text below.

Respond with ONLY a JSON object, no explanations, using this exact schema:
{
  "invoice_number": "string or null",
  "vendor_name": "string or null",
  "invoice_date": "YYYY-MM-DD or null",
  "subtotal": number or null,
  "tax_amount": number or null,
  "total_amount": number or null,
  "line_items": [
    {"description": "string", "quantity": number, "unit_price": number, "total": number}
  ],
  "field_confidence": {"invoice_number": 0.0-1.0, "vendor_name": 0.0-1.0, "invoice_date": 0.0-1.0, "subtotal": 0.0-1.0, "tax_amount": 0.0-1.0, "total_amount": 0.0-1.0}
}

Use null for fields you cannot find. Amounts must be plain numbers without currency symbols or thousands separators.

Invoice text:
"#;

/// Build the full prompt for a page group's text.
pub fn build_prompt(text: &str) -> String {
    format!("{}{}", EXTRACTION_PROMPT, text)
}

/// Parse the model's JSON reply into structured fields.
///
/// Models occasionally wrap JSON in markdown fences despite instructions, so
/// fences are stripped before parsing. A reply that is not valid JSON is a
/// permanent error for this call: retrying the identical request is unlikely
/// to help, and fallback to the next provider is cheaper.
pub fn parse_extraction_json(reply: &str) -> Result<RawExtraction, ProviderError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned)
        .map_err(|e| ProviderError::Permanent(format!("unparseable extraction JSON: {}", e)))
}

fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}
