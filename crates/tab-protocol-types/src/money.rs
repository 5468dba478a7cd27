//! Currency formatting for user-facing tab totals.

/// Currency code used for all tab totals.
pub const CURRENCY_CODE: &str = "KES";

/// Format an amount as `KES 1,234.56`: two decimals, thousands-grouped.
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = match formatted.split_once('.') {
        Some(parts) => parts,
        None => (formatted.as_str(), "00"),
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    let digits = whole.as_bytes();
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*digit as char);
    }

    let sign = if negative { "-" } else { "" };
    format!("{CURRENCY_CODE} {sign}{grouped}.{cents}")
}
