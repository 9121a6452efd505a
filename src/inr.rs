//! INR display formatting.
//!
//! The dashboard renders money in Indian notation: rupee sign with
//! lakh/crore digit grouping, and compact "1.50L" / "2.30Cr" figures in
//! dense tables. Kept here so API responses and log lines agree.

/// Format an amount as an INR string with Indian digit grouping.
///
/// `format_currency(1234.5)` -> `"₹1,234.50"`,
/// `format_currency(100000.0)` -> `"₹1,00,000.00"`.
pub fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let rupees = cents / 100;
    let paise = cents % 100;

    let grouped = group_indian(rupees);
    if negative {
        format!("-₹{}.{:02}", grouped, paise)
    } else {
        format!("₹{}.{:02}", grouped, paise)
    }
}

/// Compact notation for large figures: crores, lakhs, thousands.
///
/// `format_large_number(150000.0)` -> `"1.50L"`.
pub fn format_large_number(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let abs = amount.abs();

    if abs >= 10_000_000.0 {
        format!("{}{:.2}Cr", sign, abs / 10_000_000.0)
    } else if abs >= 100_000.0 {
        format!("{}{:.2}L", sign, abs / 100_000.0)
    } else if abs >= 1_000.0 {
        format!("{}{:.2}K", sign, abs / 1_000.0)
    } else {
        format!("{}{:.2}", sign, abs)
    }
}

/// Percentage change between two values; zero when the base is zero.
pub fn percentage_change(old_value: f64, new_value: f64) -> f64 {
    if old_value == 0.0 {
        return 0.0;
    }
    ((new_value - old_value) / old_value) * 100.0
}

/// Indian grouping: last three digits, then groups of two.
fn group_indian(mut n: u64) -> String {
    if n < 1_000 {
        return n.to_string();
    }

    let tail = n % 1_000;
    n /= 1_000;

    let mut parts = vec![format!("{:03}", tail)];
    while n >= 100 {
        parts.push(format!("{:02}", n % 100));
        n /= 100;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(1234.5), "₹1,234.50");
        assert_eq!(format_currency(100_000.0), "₹1,00,000.00");
        assert_eq!(format_currency(10_000_000.0), "₹1,00,00,000.00");
        assert_eq!(format_currency(0.0), "₹0.00");
        assert_eq!(format_currency(999.999), "₹1,000.00");
        assert_eq!(format_currency(-2500.25), "-₹2,500.25");
    }

    #[test]
    fn large_number_formatting() {
        assert_eq!(format_large_number(150_000.0), "1.50L");
        assert_eq!(format_large_number(23_000_000.0), "2.30Cr");
        assert_eq!(format_large_number(1_500.0), "1.50K");
        assert_eq!(format_large_number(999.0), "999.00");
        assert_eq!(format_large_number(-150_000.0), "-1.50L");
    }

    #[test]
    fn percentage_change_handles_zero_base() {
        assert_eq!(percentage_change(0.0, 100.0), 0.0);
        assert!((percentage_change(100.0, 110.0) - 10.0).abs() < 1e-9);
        assert!((percentage_change(200.0, 150.0) + 25.0).abs() < 1e-9);
    }
}
