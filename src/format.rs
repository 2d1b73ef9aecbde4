//! Display-number formatting for node values.
//!
//! Large numbers are optionally "millified" into K/M/B/T units before the
//! format spec is applied, so `1234.56` renders as `"1.23 K"`. The supported
//! specs are the ones node metadata actually carries: `".Nf"` (fixed
//! decimals), `".N%"` (percentage), and `",.Nf"` (thousands separators).
//! Anything unrecognized falls back to the default `".2f"`.

const MILLNAMES: [&str; 5] = ["", " K", " M", " B", " T"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    thousands: bool,
    precision: usize,
    percent: bool,
}

impl FormatSpec {
    const DEFAULT: FormatSpec = FormatSpec {
        thousands: false,
        precision: 2,
        percent: false,
    };

    /// Parses `".2f"`, `".0%"`, `",.1f"`-style specs.
    fn parse(spec: &str) -> FormatSpec {
        let mut rest = spec;
        let thousands = if let Some(stripped) = rest.strip_prefix(',') {
            rest = stripped;
            true
        } else {
            false
        };
        let Some(rest) = rest.strip_prefix('.') else {
            return FormatSpec::DEFAULT;
        };
        let percent = rest.ends_with('%');
        let digits = rest.trim_end_matches(['f', '%']);
        let Ok(precision) = digits.parse::<usize>() else {
            return FormatSpec::DEFAULT;
        };
        FormatSpec {
            thousands,
            precision,
            percent,
        }
    }
}

/// Formats a value for display, millifying into K/M/B/T units when requested.
pub fn format_value(n: f64, format_str: &str, millify: bool) -> String {
    let spec = FormatSpec::parse(format_str);

    let millidx = if millify && n != 0.0 {
        ((n.abs().log10() / 3.0).floor() as i64).clamp(0, MILLNAMES.len() as i64 - 1) as usize
    } else {
        0
    };
    let value = n / 1000f64.powi(millidx as i32);

    let rendered = if spec.percent {
        format!("{:.*}%", spec.precision, value * 100.0)
    } else {
        format!("{:.*}", spec.precision, value)
    };
    let rendered = if spec.thousands {
        group_thousands(&rendered)
    } else {
        rendered
    };
    format!("{}{}", rendered, MILLNAMES[millidx])
}

/// Inserts `,` separators into the integer part of an already-formatted number.
fn group_thousands(rendered: &str) -> String {
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
