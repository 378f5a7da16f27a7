//! Multi-column layout for choice values

/// Lay out `code: label` strings in up to `max_columns` column-major columns
///
/// The widest layout is used whose row count exceeds five while every
/// column still fits in `max_width`; otherwise one column. All but the last
/// populated cell of a row are padded to `max_width / columns`.
#[must_use]
pub fn format_columns<'a, I>(values: I, max_width: usize, max_columns: usize) -> Vec<String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let strings: Vec<String> = values
        .into_iter()
        .map(|(code, label)| format!("{code}: {label}"))
        .collect();
    let num_items = strings.len();
    if num_items == 0 {
        return Vec::new();
    }
    let max_len = strings.iter().map(|s| s.chars().count()).max().unwrap_or(0);

    let num_cols = (1..=max_columns.max(1))
        .rev()
        .find(|&cols| num_items.div_ceil(cols) > 5 && (max_len + 2) * cols < max_width)
        .unwrap_or(1);
    let num_rows = num_items.div_ceil(num_cols);
    let col_width = max_width / num_cols;

    (0..num_rows)
        .map(|row| {
            let mut line = String::new();
            for col in 0..num_cols {
                let Some(cell) = strings.get(col * num_rows + row) else {
                    continue;
                };
                let has_next = col + 1 < num_cols && (col + 1) * num_rows + row < num_items;
                if has_next {
                    line.push_str(&format!("{cell:<col_width$}"));
                } else {
                    line.push_str(cell);
                }
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn choices(n: usize) -> IndexMap<String, String> {
        (0..n).map(|i| (i.to_string(), format!("Item{i}"))).collect()
    }

    #[test]
    fn empty_input() {
        let empty = IndexMap::<String, String>::new();
        assert!(format_columns(&empty, 105, 4).is_empty());
    }

    #[test]
    fn single_value() {
        let one: IndexMap<String, String> =
            [("K".to_string(), "V".to_string())].into_iter().collect();
        assert_eq!(format_columns(&one, 105, 4), vec!["K: V".to_string()]);
    }

    #[test]
    fn few_values_stay_in_one_column() {
        let lines = format_columns(&choices(5), 105, 4);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "0: Item0");
    }

    #[test]
    fn many_values_go_column_major() {
        // 24 items: 4 columns give 6 rows
        let lines = format_columns(&choices(24), 105, 4);
        assert_eq!(lines.len(), 6);
        let col_width = 105 / 4;
        assert_eq!(
            lines[0],
            format!(
                "{:<w$}{:<w$}{:<w$}{}",
                "0: Item0",
                "6: Item6",
                "12: Item12",
                "18: Item18",
                w = col_width
            )
        );
    }

    #[test]
    fn ragged_last_column_is_not_padded() {
        // 13 items, 2 columns → 7 rows; row 6 has only one cell
        let lines = format_columns(&choices(13), 60, 2);
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[6], "6: Item6");
        assert!(lines[0].starts_with("0: Item0"));
        assert!(lines[0].ends_with("7: Item7"));
    }

    #[test]
    fn wide_labels_reduce_columns() {
        let wide: IndexMap<String, String> = (0..12)
            .map(|i| (i.to_string(), "x".repeat(40)))
            .collect();
        // (44 + 2) * 2 = 92 < 105, 3 columns would not fit
        let lines = format_columns(&wide, 105, 4);
        assert_eq!(lines.len(), 6);
    }
}
