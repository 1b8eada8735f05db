use chrono::{DateTime, Utc};

use crate::history::{QuestionType, Scaling};
use crate::timeline::CursorValue;

/// Maps an internal location in `[0, 1]` onto the question's real range.
///
/// With a `zero_point` the axis is logarithmic; otherwise linear. Missing
/// range bounds leave the value unscaled.
pub fn scale_internal_location(x: f64, scaling: &Scaling) -> f64 {
    let (Some(min), Some(max)) = (scaling.range_min, scaling.range_max) else {
        return x;
    };
    if let Some(zero) = scaling.zero_point {
        let deriv_ratio = (max - zero) / (min - zero);
        if deriv_ratio.is_finite() && deriv_ratio > 0.0 && (deriv_ratio - 1.0).abs() > f64::EPSILON {
            return min + (max - min) * (deriv_ratio.powf(x) - 1.0) / (deriv_ratio - 1.0);
        }
    }
    min + (max - min) * x
}

/// Display string for a cursor value; `?` when there is none.
pub fn format_value(value: CursorValue, question_type: QuestionType, scaling: &Scaling) -> String {
    let CursorValue::Value(x) = value else {
        return "?".to_string();
    };
    match question_type {
        QuestionType::Binary | QuestionType::MultipleChoice => format_percent(x),
        QuestionType::Date => {
            let secs = scale_internal_location(x, scaling);
            match DateTime::<Utc>::from_timestamp(secs.round() as i64, 0) {
                Some(dt) => dt.format("%Y-%m-%d").to_string(),
                None => "?".to_string(),
            }
        }
        QuestionType::Numeric | QuestionType::Discrete => {
            format_number(scale_internal_location(x, scaling))
        }
    }
}

fn format_percent(p: f64) -> String {
    let pct = p * 100.0;
    if pct != 0.0 && pct.abs() < 1.0 {
        format!("{:.1}%", pct)
    } else {
        format!("{:.0}%", pct)
    }
}

fn format_number(v: f64) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
