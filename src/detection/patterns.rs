use once_cell::sync::Lazy;
use regex::Regex;

pub static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]*[a-zA-Z0-9]")
        .unwrap()
});

pub static CREDIT_CARD_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").unwrap()
});

pub static AADHAAR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[2-9]\d{3}[ -]?\d{4}[ -]?\d{4}\b").unwrap()
});

pub static SSN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{3})-(\d{2})-(\d{4})\b").unwrap()
});

pub static IP_ADDRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b")
        .unwrap()
});

pub static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[ .-]?)?(?:\(\d{3}\)[ .-]?|\b\d{3}[ .-]?)\d{3}[ .-]?\d{4}\b")
        .unwrap()
});
