use chrono::NaiveDate;

use super::ExportRow;

/// Header row of the transactions export.
pub const CSV_COLUMNS: [&str; 11] = [
    "transaction_date",
    "transaction_name",
    "merchant_name",
    "amount",
    "pending",
    "account_name",
    "institution_name",
    "payment_channel",
    "transaction_type",
    "category_id",
    "flow_direction",
];

const MOBILE_KEYWORDS: [&str; 4] = ["mobile", "android", "iphone", "ipad"];

/// True if the `User-Agent` looks like a phone or tablet.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    MOBILE_KEYWORDS.iter().any(|kw| ua.contains(kw))
}

/// `transactions_{from}_{to}.csv`, with empty segments for an open range.
pub fn export_filename(date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> String {
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    format!("transactions_{}_{}.csv", fmt(date_from), fmt(date_to))
}

/// Renders the header and `rows` as RFC 4180 CSV with CRLF line endings.
pub fn write_csv(rows: &[ExportRow]) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    write_record(&mut out, CSV_COLUMNS.iter().copied());
    for row in rows {
        let record = row.to_record();
        write_record(&mut out, record.iter().map(String::as_str));
    }
    out
}

fn write_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_mobile_detection() {
        for ua in [
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
            "Mozilla/5.0 (Linux; Android 14; Pixel 8)",
            "Mozilla/5.0 (iPad; CPU OS 16_0 like Mac OS X)",
            "SomeBrowser Mobile/1.0",
        ] {
            assert!(is_mobile_user_agent(ua), "{ua}");
        }
        assert!(!is_mobile_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
        ));
        assert!(!is_mobile_user_agent(""));
    }

    #[test]
    fn test_export_filename() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 1);
        let to = NaiveDate::from_ymd_opt(2024, 1, 31);
        assert_eq!(export_filename(from, to), "transactions_2024-01-01_2024-01-31.csv");
        assert_eq!(export_filename(None, None), "transactions__.csv");
    }

    #[test]
    fn test_write_csv_quotes_special_fields() {
        let row = ExportRow {
            transaction_date: NaiveDate::from_ymd_opt(2024, 2, 3),
            transaction_name: Some("Smith, \"Jr\" & Co".to_owned()),
            merchant_name: None,
            amount: Some(Decimal::new(1250, 2)),
            pending: Some(true),
            account_name: Some("Ops".to_owned()),
            institution_name: None,
            payment_channel: None,
            transaction_type: None,
            category_id: None,
            flow_direction: None,
        };

        let csv = write_csv(&[row]);
        let mut lines = csv.split("\r\n");
        assert_eq!(lines.next(), Some(CSV_COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("2024-02-03,\"Smith, \"\"Jr\"\" & Co\",,12.50,true,Ops,,,,,")
        );
    }
}
