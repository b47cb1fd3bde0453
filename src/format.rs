// 💱 Format - money and count strings for answers and reports

/// Formats an integer with comma thousands separators.
///
/// ```
/// use sales_dashboard::format::format_thousands;
/// assert_eq!(format_thousands(1234567), "1,234,567");
/// assert_eq!(format_thousands(42), "42");
/// ```
pub fn format_thousands(n: u64) -> String {
    group_digits(&n.to_string())
}

fn group_digits(digits: &str) -> String {
    let mut result = String::new();
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

/// Two decimals with thousands separators, e.g. `-1,234.50`.
/// Non-finite amounts print as Rust formats them (`NaN`, `inf`).
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return amount.to_string();
    }

    let rounded = format!("{:.2}", amount.abs());
    let (whole, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let sign = if amount < 0.0 && rounded != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, group_digits(whole), frac)
}

/// `¥ 1,234.50` style money string.
pub fn format_currency(symbol: &str, amount: f64) -> String {
    format!("{} {}", symbol, format_amount(amount))
}
