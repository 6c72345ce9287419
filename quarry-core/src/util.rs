pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Longest prefix of `value` that fits `max` bytes without splitting a character.
pub fn char_prefix(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

#[macro_export]
macro_rules! possibly_parenthesized {
    ($buff:ident, $cond:expr, $v:expr) => {
        if $cond {
            $buff.push('(');
            $v;
            $buff.push(')');
        } else {
            $v;
        }
    };
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            $crate::char_prefix(&$query, 497).trim_end(),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separated_by_skips_empty_writes() {
        let mut out = String::from("SELECT ");
        separated_by(
            &mut out,
            ["a", "", "b"],
            |out, v| out.push_str(v),
            ", ",
        );
        assert_eq!(out, "SELECT a, b");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(400);
        let text = format!("{}", truncate_long!(long));
        assert!(text.ends_with("..."));
        assert!(text.len() <= 500);
    }
}
