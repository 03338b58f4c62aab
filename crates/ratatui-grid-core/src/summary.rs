use crate::record::Record;
use crate::value::Value;

/// Aggregate shown in a column footer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryKind {
    Min,
    Max,
    Sum,
    Average,
    Count,
}

impl SummaryKind {
    pub fn label(self) -> &'static str {
        match self {
            SummaryKind::Min => "Min",
            SummaryKind::Max => "Max",
            SummaryKind::Sum => "Sum",
            SummaryKind::Average => "Avg",
            SummaryKind::Count => "Count",
        }
    }
}

/// Computes `kind` over `field` for the records at `indices`.
///
/// `Count` counts every row; the other kinds ignore nulls. `Sum`/`Average` only consider
/// numeric values and yield [`Value::Null`] when there are none.
pub fn summarize(records: &[Record], indices: &[usize], field: &str, kind: SummaryKind) -> Value {
    let values = indices
        .iter()
        .filter_map(|&i| records.get(i))
        .map(|r| r.get(field))
        .filter(|v| !v.is_null());

    match kind {
        SummaryKind::Count => Value::Number(indices.len() as f64),
        SummaryKind::Min => values
            .min_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        SummaryKind::Max => values
            .max_by(|a, b| a.total_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        SummaryKind::Sum | SummaryKind::Average => {
            let mut sum = 0.0;
            let mut n = 0usize;
            for v in values.filter_map(Value::as_f64) {
                sum += v;
                n += 1;
            }
            if n == 0 {
                return Value::Null;
            }
            if kind == SummaryKind::Sum {
                Value::Number(sum)
            } else {
                Value::Number(sum / n as f64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_nulls_except_for_count() {
        let records = vec![
            Record::new(1).with("x", 4),
            Record::new(2),
            Record::new(3).with("x", 2),
        ];
        let all = [0, 1, 2];
        assert_eq!(summarize(&records, &all, "x", SummaryKind::Min), Value::from(2));
        assert_eq!(summarize(&records, &all, "x", SummaryKind::Average), Value::from(3));
        assert_eq!(summarize(&records, &all, "x", SummaryKind::Count), Value::from(3));
        assert_eq!(summarize(&records, &[1], "x", SummaryKind::Sum), Value::Null);
    }
}
