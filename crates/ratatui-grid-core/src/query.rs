//! In-memory query evaluation: filter, search, sort, group and page.
//!
//! Remote data sources receive the same [`Query`] description (see [`crate::source`]) and are
//! expected to apply it themselves.

use crate::column::Column;
use crate::column::ColumnType;
use crate::error::GridError;
use crate::error::GridResult;
use crate::record::Record;
use crate::record::RowId;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// Inclusive range; the filter value is the lower bound.
    Between(Value),
    Empty,
    NotEmpty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterSpec {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Checks that the operator and operand make sense for `column`.
    pub fn validate(&self, column: &Column) -> GridResult<()> {
        let invalid = |message: &str| GridError::InvalidFilter {
            field: self.field.clone(),
            message: message.to_string(),
        };
        let ordered = matches!(
            column.column_type,
            ColumnType::Number | ColumnType::DateTime
        );
        match &self.op {
            FilterOp::Contains | FilterOp::NotContains => {
                if matches!(
                    column.column_type,
                    ColumnType::Boolean | ColumnType::Checkbox
                ) {
                    return Err(invalid("text matching is not supported for boolean columns"));
                }
            }
            FilterOp::Greater
            | FilterOp::GreaterOrEqual
            | FilterOp::Less
            | FilterOp::LessOrEqual => {
                if !ordered {
                    return Err(invalid("comparison requires a number or date column"));
                }
            }
            FilterOp::Between(upper) => {
                if !ordered {
                    return Err(invalid("range requires a number or date column"));
                }
                if self.value.total_cmp(upper) == Ordering::Greater {
                    return Err(invalid("range start is after range end"));
                }
            }
            FilterOp::Equals | FilterOp::NotEquals | FilterOp::Empty | FilterOp::NotEmpty => {}
        }
        let needs_operand = !matches!(self.op, FilterOp::Empty | FilterOp::NotEmpty);
        if needs_operand {
            match column.column_type {
                ColumnType::Number if self.value.as_f64().is_none() => {
                    return Err(invalid("expected a number"));
                }
                ColumnType::DateTime if !matches!(self.value, Value::DateTime(_)) => {
                    return Err(invalid("expected a date"));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn matches(&self, record: &Record) -> bool {
        let v = record.get(&self.field);
        match &self.op {
            FilterOp::Equals => values_equal(v, &self.value),
            FilterOp::NotEquals => !values_equal(v, &self.value),
            FilterOp::Contains => v.contains_text(&self.value.format(None)),
            FilterOp::NotContains => !v.contains_text(&self.value.format(None)),
            FilterOp::Greater => !v.is_null() && v.total_cmp(&self.value) == Ordering::Greater,
            FilterOp::GreaterOrEqual => !v.is_null() && v.total_cmp(&self.value) != Ordering::Less,
            FilterOp::Less => !v.is_null() && v.total_cmp(&self.value) == Ordering::Less,
            FilterOp::LessOrEqual => !v.is_null() && v.total_cmp(&self.value) != Ordering::Greater,
            FilterOp::Between(upper) => {
                !v.is_null()
                    && v.total_cmp(&self.value) != Ordering::Less
                    && v.total_cmp(upper) != Ordering::Greater
            }
            FilterOp::Empty => v.is_empty(),
            FilterOp::NotEmpty => !v.is_empty(),
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(x), other) | (other, Value::Bool(x)) => *x == other.as_bool(),
        _ => a.total_cmp(b) == Ordering::Equal,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec {
    pub field: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

/// A complete query description, usable locally or shipped to a [`crate::source::DataSource`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub sorts: Vec<SortSpec>,
    pub filters: Vec<FilterSpec>,
    pub groups: Vec<GroupSpec>,
    pub search: Option<String>,
    pub page: Option<Page>,
}

/// Path of group values from the outermost group down.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupKey(pub Vec<String>);

#[derive(Clone, Debug, PartialEq)]
pub enum ResultRow {
    Data {
        /// Index into the record list the query ran over.
        index: usize,
        id: RowId,
        level: usize,
    },
    Group {
        key: GroupKey,
        field: String,
        value: Value,
        level: usize,
        count: usize,
        expanded: bool,
    },
}

impl ResultRow {
    pub fn row_id(&self) -> Option<RowId> {
        match self {
            ResultRow::Data { id, .. } => Some(*id),
            ResultRow::Group { .. } => None,
        }
    }

    pub fn level(&self) -> usize {
        match self {
            ResultRow::Data { level, .. } | ResultRow::Group { level, .. } => *level,
        }
    }
}

/// Output of a query run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<ResultRow>,
    /// Record indices that passed filtering and search, in sorted order. Used for summaries.
    pub filtered: Vec<usize>,
}

impl ResultSet {
    /// Every record, in order, without grouping. Used for remote data that arrives pre-queried.
    pub fn passthrough(records: &[Record]) -> Self {
        Self {
            rows: records
                .iter()
                .enumerate()
                .map(|(index, r)| ResultRow::Data {
                    index,
                    id: r.id,
                    level: 0,
                })
                .collect(),
            filtered: (0..records.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_ids(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.iter().filter_map(ResultRow::row_id)
    }

    pub fn position_of(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.row_id() == Some(id))
    }
}

pub struct QueryEngine;

impl QueryEngine {
    pub fn run(
        records: &[Record],
        query: &Query,
        columns: &[Column],
        collapsed: &HashSet<GroupKey>,
    ) -> ResultSet {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut filtered: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| query.filters.iter().all(|f| f.matches(r)))
            .filter(|(_, r)| match search {
                Some(term) => columns.iter().any(|c| {
                    r.get(&c.field)
                        .format(c.format.as_deref())
                        .to_lowercase()
                        .contains(&term.to_lowercase())
                }),
                None => true,
            })
            .map(|(i, _)| i)
            .collect();

        // Group fields sort first so members of a group are contiguous.
        let keys: Vec<SortSpec> = query
            .groups
            .iter()
            .map(|g| SortSpec::new(g.field.clone(), SortDirection::Ascending))
            .chain(query.sorts.iter().cloned())
            .collect();
        if !keys.is_empty() {
            filtered.sort_by(|&a, &b| compare_records(&records[a], &records[b], &keys));
        }

        let mut rows = Vec::with_capacity(filtered.len());
        if query.groups.is_empty() {
            rows.extend(filtered.iter().map(|&index| ResultRow::Data {
                index,
                id: records[index].id,
                level: 0,
            }));
        } else {
            let mut path = Vec::new();
            emit_groups(
                records,
                &filtered,
                &query.groups,
                0,
                &mut path,
                collapsed,
                &mut rows,
            );
        }

        if let Some(page) = query.page {
            let start = page.offset.min(rows.len());
            let end = start.saturating_add(page.limit).min(rows.len());
            rows.truncate(end);
            rows.drain(..start);
        }

        debug!(
            target: "ratatui_grid::query",
            total = records.len(),
            filtered = filtered.len(),
            rows = rows.len(),
            "query evaluated"
        );
        ResultSet { rows, filtered }
    }
}

fn compare_records(a: &Record, b: &Record, keys: &[SortSpec]) -> Ordering {
    for key in keys {
        let ord = a.get(&key.field).total_cmp(b.get(&key.field));
        let ord = match key.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn emit_groups(
    records: &[Record],
    members: &[usize],
    groups: &[GroupSpec],
    level: usize,
    path: &mut Vec<String>,
    collapsed: &HashSet<GroupKey>,
    out: &mut Vec<ResultRow>,
) {
    let Some(group) = groups.get(level) else {
        out.extend(members.iter().map(|&index| ResultRow::Data {
            index,
            id: records[index].id,
            level,
        }));
        return;
    };

    let mut start = 0;
    while start < members.len() {
        let value = records[members[start]].get(&group.field).clone();
        let mut end = start + 1;
        while end < members.len()
            && records[members[end]]
                .get(&group.field)
                .total_cmp(&value)
                == Ordering::Equal
        {
            end += 1;
        }

        path.push(value.format(None));
        let key = GroupKey(path.clone());
        let expanded = !collapsed.contains(&key);
        out.push(ResultRow::Group {
            key,
            field: group.field.clone(),
            value,
            level,
            count: end - start,
            expanded,
        });
        if expanded {
            emit_groups(
                records,
                &members[start..end],
                groups,
                level + 1,
                path,
                collapsed,
                out,
            );
        }
        path.pop();
        start = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<Record> {
        (0..10)
            .map(|i| {
                Record::new(i)
                    .with("n", i as i64)
                    .with("kind", if i % 3 == 0 { "a" } else { "b" })
                    .with("name", format!("item {i}"))
            })
            .collect()
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("n", "N", 4).with_type(ColumnType::Number),
            Column::new("kind", "Kind", 4),
            Column::new("name", "Name", 10),
        ]
    }

    #[test]
    fn groups_emit_headers_and_respect_collapse() {
        let q = Query {
            groups: vec![GroupSpec {
                field: "kind".into(),
            }],
            ..Default::default()
        };
        let rs = QueryEngine::run(&data(), &q, &columns(), &HashSet::new());
        assert!(matches!(&rs.rows[0], ResultRow::Group { count: 4, .. }));
        assert_eq!(rs.rows.len(), 12);

        let mut collapsed = HashSet::new();
        collapsed.insert(GroupKey(vec!["a".into()]));
        let rs = QueryEngine::run(&data(), &q, &columns(), &collapsed);
        assert_eq!(rs.rows.len(), 8);
        assert!(matches!(&rs.rows[1], ResultRow::Group { count: 6, .. }));
    }

    #[test]
    fn search_matches_formatted_text() {
        let q = Query {
            search: Some("ITEM 7".into()),
            ..Default::default()
        };
        let rs = QueryEngine::run(&data(), &q, &columns(), &HashSet::new());
        assert_eq!(rs.row_ids().collect::<Vec<_>>(), vec![RowId(7)]);
    }

    #[test]
    fn paging_slices_rows() {
        let q = Query {
            page: Some(Page {
                offset: 8,
                limit: 5,
            }),
            ..Default::default()
        };
        let rs = QueryEngine::run(&data(), &q, &columns(), &HashSet::new());
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.filtered.len(), 10);
    }

    #[test]
    fn validation_rejects_mismatched_operands() {
        let cols = columns();
        let gt_text = FilterSpec::new("kind", FilterOp::Greater, 3);
        assert!(matches!(
            gt_text.validate(&cols[1]),
            Err(GridError::InvalidFilter { .. })
        ));
        let bad_number = FilterSpec::new("n", FilterOp::Equals, "abc");
        assert!(bad_number.validate(&cols[0]).is_err());
        let range = FilterSpec::new("n", FilterOp::Between(Value::from(2)), 5);
        assert!(range.validate(&cols[0]).is_err());
        let ok = FilterSpec::new("n", FilterOp::Between(Value::from(5)), 2);
        assert!(ok.validate(&cols[0]).is_ok());
    }
}
