//! Receipt field extraction
//!
//! Pattern-matching heuristics over recognized lines: vendor name, date,
//! total, tax, and line items. Extraction never fails; anything not found
//! stays unset.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;

/// Lines that look like payment noise rather than a vendor name.
static VENDOR_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(total|visa|mastercard|debit|credit|invoice|receipt)\b")
        .expect("valid regex")
});

/// Keywords that label the total line.
static TOTAL_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(total|amount due|balance due|grand total)\b").expect("valid regex")
});

/// Keywords that label the tax line.
static TAX_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(tax|hst|gst|vat)\b").expect("valid regex"));

/// Loose amount: optional currency symbol, optional cents.
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$?\s*([0-9]+(?:\.[0-9]{2})?)").expect("valid regex"));

/// Strict amount: requires the currency symbol and two fraction digits.
static STRICT_DOLLAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9]+\.[0-9]{2})").expect("valid regex"));

static DATE_ISO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[-/](0?[1-9]|1[0-2])[-/](0?[1-9]|[12]\d|3[01])\b").expect("valid regex")
});

static DATE_US: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(0?[1-9]|1[0-2])[-/](0?[1-9]|[12]\d|3[01])[-/](\d{4}|\d{2})\b")
        .expect("valid regex")
});

static DATE_MONTH_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2}),?\s+(\d{4})\b")
        .expect("valid regex")
});

/// Structured record extracted from a receipt. Every field is optional;
/// absence is expressed as `None`, never a sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedFields {
    pub vendor: Option<String>,
    pub date: Option<NaiveDate>,
    pub total: Option<f64>,
    pub tax: Option<f64>,
    pub items: Vec<LineItem>,
}

/// One purchased item: the raw line plus the amount found on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub description: String,
    pub amount: f64,
}

/// Extract structured fields from recognized lines in reading order.
pub fn parse_receipt(lines: &[String]) -> ParsedFields {
    let vendor_idx = find_vendor(lines);
    let vendor = vendor_idx.map(|i| lines[i].trim().to_string());
    let date = lines.iter().find_map(|line| parse_date(line));

    let total_idx = lines.iter().position(|l| TOTAL_KEYWORDS.is_match(l));
    let total = find_total(lines, total_idx);
    let tax = lines
        .iter()
        .find(|l| TAX_KEYWORDS.is_match(l))
        .and_then(|l| extract_amount(l));

    let items = match (vendor_idx, total_idx) {
        (Some(start), Some(end)) if start < end => collect_items(&lines[start + 1..end]),
        _ => Vec::new(),
    };

    ParsedFields {
        vendor,
        date,
        total,
        tax,
        items,
    }
}

/// The vendor is the first mostly-alphabetic line that is not payment
/// noise. A heuristic: receipt headers usually lead with the store name.
fn find_vendor(lines: &[String]) -> Option<usize> {
    lines.iter().position(|line| {
        let trimmed = line.trim();
        !trimmed.is_empty() && !VENDOR_NOISE.is_match(trimmed) && mostly_alphabetic(trimmed)
    })
}

fn mostly_alphabetic(line: &str) -> bool {
    let total = line.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return false;
    }
    let alphabetic = line.chars().filter(|c| c.is_alphabetic()).count();
    alphabetic * 2 >= total
}

/// Total extraction: prefer the amount on an explicitly labeled line, and
/// fall back to the largest dollar-sign amount anywhere on the receipt.
/// The fallback is a heuristic, not guaranteed correct: totals are usually
/// the largest amount printed.
fn find_total(lines: &[String], total_idx: Option<usize>) -> Option<f64> {
    if let Some(amount) = total_idx
        .and_then(|i| extract_amount(&lines[i]))
        .filter(|a| *a > 0.0)
    {
        return Some(amount);
    }

    lines
        .iter()
        .flat_map(|line| {
            STRICT_DOLLAR
                .captures_iter(line)
                .filter_map(|cap| cap[1].parse::<f64>().ok())
        })
        .fold(None, |best: Option<f64>, amount| match best {
            Some(b) if b >= amount => Some(b),
            _ => Some(amount),
        })
}

/// First loose amount on a line.
fn extract_amount(line: &str) -> Option<f64> {
    AMOUNT
        .captures(line)
        .and_then(|cap| cap[1].parse::<f64>().ok())
}

fn collect_items(lines: &[String]) -> Vec<LineItem> {
    lines
        .iter()
        .filter(|l| !TOTAL_KEYWORDS.is_match(l) && !TAX_KEYWORDS.is_match(l))
        .filter_map(|l| {
            extract_amount(l).map(|amount| LineItem {
                description: l.trim().to_string(),
                amount,
            })
        })
        .collect()
}

fn parse_date(line: &str) -> Option<NaiveDate> {
    if let Some(cap) = DATE_ISO.captures(line) {
        let (year, month, day) = (parse_num(&cap[1]), parse_num(&cap[2]), parse_num(&cap[3]));
        return NaiveDate::from_ymd_opt(year as i32, month, day);
    }
    if let Some(cap) = DATE_US.captures(line) {
        let (month, day) = (parse_num(&cap[1]), parse_num(&cap[2]));
        let year = parse_num(&cap[3]);
        let year = if year < 100 { 2000 + year } else { year };
        return NaiveDate::from_ymd_opt(year as i32, month, day);
    }
    if let Some(cap) = DATE_MONTH_NAME.captures(line) {
        let month = month_number(&cap[1])?;
        let (day, year) = (parse_num(&cap[2]), parse_num(&cap[3]));
        return NaiveDate::from_ymd_opt(year as i32, month, day);
    }
    None
}

fn parse_num(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

fn month_number(name: &str) -> Option<u32> {
    match name.to_ascii_lowercase().as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}
