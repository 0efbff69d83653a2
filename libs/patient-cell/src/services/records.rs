use chrono::NaiveDate;

use shared_models::entities::{Payment, PaymentStatus};

use crate::models::FinancialSummary;

pub const PATIENT_PALETTE: [&str; 10] = [
    "#2A9D8F", "#E76F51", "#F4A261", "#E9C46A", "#264653",
    "#457B9D", "#1D3557", "#9B5DE5", "#F72585", "#06D6A0",
];

/// Digits only; CPFs are stored unformatted.
pub fn clean_cpf(cpf: &str) -> String {
    cpf.chars().filter(char::is_ascii_digit).collect()
}

/// `000.000.000-00` for eleven digits, otherwise just the digits.
pub fn format_cpf(cpf: &str) -> String {
    let digits = clean_cpf(cpf);
    if digits.len() != 11 {
        return digits;
    }
    format!("{}.{}.{}-{}", &digits[0..3], &digits[3..6], &digits[6..9], &digits[9..11])
}

/// Lowercases and strips the accents used in Portuguese names.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            'ñ' | 'Ñ' => 'n',
            other => other,
        })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a patient matches a free-text search: accent-insensitive name
/// substring, or the exact CPF digits.
pub fn matches_search(name: &str, cpf: &str, query: &str) -> bool {
    let wanted_cpf = clean_cpf(query);
    if !wanted_cpf.is_empty() && clean_cpf(cpf) == wanted_cpf {
        return true;
    }
    normalize(name).contains(&normalize(query.trim()))
}

/// Stable colour for a new record that did not pick one.
pub fn pick_color(seed: &uuid::Uuid) -> &'static str {
    PATIENT_PALETTE[seed.as_bytes()[0] as usize % PATIENT_PALETTE.len()]
}

/// Totals over a patient's payments. Partial payments count half paid and
/// half pending; free sessions only add to the total.
pub fn financial_summary(payments: &[Payment]) -> FinancialSummary {
    let mut summary = FinancialSummary::default();

    for payment in payments {
        summary.total += payment.amount;
        match payment.status {
            PaymentStatus::Paid => summary.paid += payment.amount,
            PaymentStatus::Pending => summary.pending += payment.amount,
            PaymentStatus::Partial => {
                summary.paid += payment.amount / 2.0;
                summary.pending += payment.amount / 2.0;
            }
            PaymentStatus::Free => {}
        }
    }

    summary.balance = summary.pending;
    summary
}

/// Last day of a leave period starting at `start`.
pub fn leave_end_date(start: NaiveDate, days_off: u32) -> Option<NaiveDate> {
    match days_off {
        0 => None,
        days => start.checked_add_days(chrono::Days::new(u64::from(days) - 1)),
    }
}
