//! String expressions.

use crate::error::Result;
use crate::express::Arity;
use crate::keywords::Keyword;
use crate::symbols::SymbolKind;
use crate::token::Token;

use super::builtins::Y2K_DAYS;
use super::stream::Tok;
use super::Parser;

const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";
const MAX_DATETIME_LEN: usize = 200;

impl Parser {
    /// A string expression if one starts here; otherwise nothing is
    /// consumed.
    pub(crate) fn try_parse_string(&mut self) -> Result<Option<String>> {
        let la = self.get()?;
        let s = match &la.tok {
            Tok::Raw(Token::String(s)) => s.clone(),
            Tok::Keyword(k) if k.is_string_function() => {
                let k = *k;
                self.string_function(k)?
            }
            Tok::Ident(entry) if entry.kind() == SymbolKind::String => entry
                .get::<String>()
                .ok_or_else(|| self.error(&format!("Identifier '{}' has no value.", entry.name())))?,
            _ => {
                self.unget(la);
                return Ok(None);
            }
        };
        Ok(Some(s))
    }

    pub fn parse_string(&mut self) -> Result<String> {
        match self.try_parse_string()? {
            Some(s) => Ok(s),
            None => {
                let la = self.get()?;
                Err(self.unexpected("string expression", &la))
            }
        }
    }

    /// `( string )`
    pub(crate) fn parse_string_param(&mut self) -> Result<String> {
        self.expect(&Token::LParen)?;
        let s = self.parse_string()?;
        self.expect(&Token::RParen)?;
        Ok(s)
    }

    fn string_function(&mut self, k: Keyword) -> Result<String> {
        match k {
            Keyword::Str => self.parse_str(),
            Keyword::Vstr => self.parse_vstr(),
            Keyword::Concat => self.parse_concat(),
            Keyword::Chr => self.parse_chr(),
            Keyword::Substr => self.parse_substr(),
            Keyword::Strupr => Ok(self.parse_string_param()?.to_uppercase()),
            Keyword::Strlwr => Ok(self.parse_string_param()?.to_lowercase()),
            Keyword::Datetime => self.parse_datetime(),
            other => Err(self.error(&format!("'{}' is not a string function.", other.as_str()))),
        }
    }

    /// `str(value, width, precision)`
    fn parse_str(&mut self) -> Result<String> {
        self.expect(&Token::LParen)?;
        let value = self.parse_float()?;
        self.parse_comma()?;
        let width = self.parse_float()?.trunc() as i64;
        self.parse_comma()?;
        let precision = self.parse_float()?.trunc() as i64;
        self.expect(&Token::RParen)?;
        Ok(format_float(value, width, precision))
    }

    /// `vstr(components, vector, separator, width, precision)`
    fn parse_vstr(&mut self) -> Result<String> {
        self.expect(&Token::LParen)?;
        let count = (self.parse_float()?.trunc() as i64).clamp(2, 5) as usize;
        self.parse_comma()?;
        let vector = self.parse_express(Arity::Float)?;
        self.parse_comma()?;
        let separator = self.parse_string()?;
        self.parse_comma()?;
        let width = self.parse_float()?.trunc() as i64;
        self.parse_comma()?;
        let precision = self.parse_float()?.trunc() as i64;
        self.expect(&Token::RParen)?;

        let parts: Vec<String> = (0..count)
            .map(|i| format_float(vector.get(i), width, precision))
            .collect();
        Ok(parts.join(&separator))
    }

    /// `concat(s1 [,] s2 ...)`
    fn parse_concat(&mut self) -> Result<String> {
        self.expect(&Token::LParen)?;
        let mut out = self.parse_string()?;
        while !self.accept(&Token::RParen)? {
            self.parse_comma()?;
            out.push_str(&self.parse_string()?);
        }
        Ok(out)
    }

    fn parse_chr(&mut self) -> Result<String> {
        let code = self.parse_float_param()?.trunc();
        if !(0.0..=65535.0).contains(&code) {
            return Err(self.error("Illegal character value in chr."));
        }
        // lone surrogates have no char; they read as the replacement character
        let c = char::from_u32(code as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
        Ok(c.to_string())
    }

    /// `substr(s, start, len)` with a 1-based start.
    fn parse_substr(&mut self) -> Result<String> {
        self.expect(&Token::LParen)?;
        let s = self.parse_string()?;
        self.parse_comma()?;
        let start = self.parse_float()?.trunc() as i64;
        self.parse_comma()?;
        let len = self.parse_float()?.trunc() as i64;
        self.expect(&Token::RParen)?;

        let total = s.chars().count() as i64;
        if start + len - 1 > total || start < 1 || len < 0 {
            return Err(self.error("Illegal parameters in substr."));
        }
        Ok(s.chars().skip((start - 1) as usize).take(len as usize).collect())
    }

    /// `datetime(days [, format])`, days counted from 2000-01-01 UTC.
    fn parse_datetime(&mut self) -> Result<String> {
        self.expect(&Token::LParen)?;
        let days = self.parse_float()?;
        self.parse_comma()?;
        let format = if self.accept(&Token::RParen)? {
            None
        } else {
            let f = self.parse_string()?;
            self.expect(&Token::RParen)?;
            Some(f)
        };

        let format = match format.as_deref() {
            None => DEFAULT_DATETIME_FORMAT,
            Some("") => return Err(self.error("Empty format string.")),
            Some(f) if f.len() > MAX_DATETIME_LEN => return Err(self.error("Format string too long.")),
            Some(f) => f,
        };
        let timestamp = ((days + Y2K_DAYS) * 86400.0 + 0.5).floor() as i64;
        match format_timestamp(timestamp, format) {
            Some(s) if !s.is_empty() && s.len() < MAX_DATETIME_LEN => Ok(s),
            _ => Err(self.error("Invalid formatting code in format string, or resulting string too long.")),
        }
    }
}

/// `%f`-style formatting: positive width pads with spaces, negative width
/// pads with zeros, negative precision means the default of 6.
pub(crate) fn format_float(value: f64, width: i64, precision: i64) -> String {
    let p = usize::try_from(precision).unwrap_or(6);
    let w = width.unsigned_abs() as usize;
    if width > 0 {
        format!("{value:>w$.p$}")
    } else if width < 0 {
        format!("{value:0w$.p$}")
    } else {
        format!("{value:.p$}")
    }
}

/// Civil date from days since 1970-01-01, as `(year, month, day)`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn is_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn day_of_year(year: i64, month: u32, day: u32) -> u32 {
    const CUMULATIVE: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let leap = u32::from(month > 2 && is_leap(year));
    CUMULATIVE[(month - 1) as usize] + day + leap
}

/// A strftime subset over UTC: `%Y %y %m %d %j %H %M %S %%`. Any other
/// code yields `None`.
fn format_timestamp(timestamp: i64, format: &str) -> Option<String> {
    let days = timestamp.div_euclid(86_400);
    let secs = timestamp.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let (hour, minute, second) = (secs / 3600, secs / 60 % 60, secs % 60);

    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'Y' => out.push_str(&year.to_string()),
            'y' => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            'm' => out.push_str(&format!("{month:02}")),
            'd' => out.push_str(&format!("{day:02}")),
            'j' => out.push_str(&format!("{:03}", day_of_year(year, month, day))),
            'H' => out.push_str(&format!("{hour:02}")),
            'M' => out.push_str(&format!("{minute:02}")),
            'S' => out.push_str(&format!("{second:02}")),
            '%' => out.push('%'),
            _ => return None,
        }
    }
    Some(out)
}
