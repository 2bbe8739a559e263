use crate::executor::QueryResult;
use crate::value::Row;

/// Turn a tabular result into one [`Row`] per result row.
///
/// Keys are the result's column labels, so `SELECT *` and an explicit
/// projection can produce different key sets over the same data. Rows
/// keep the order the executor returned them in.
pub fn to_rows(result: QueryResult) -> Vec<Row> {
    let QueryResult { columns, rows } = result;
    rows.into_iter()
        .map(|values| columns.iter().map(String::as_str).zip(values).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_to_rows_keys_from_labels() {
        let result = QueryResult::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(2), Value::from("b")],
                vec![Value::Integer(1), Value::from("a")],
            ],
        );
        let rows = to_rows(result);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(2)));
        assert_eq!(rows[1].get("name"), Some(&Value::from("a")));
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_to_rows_empty() {
        let result = QueryResult::new(vec!["id".into()], vec![]);
        assert!(to_rows(result).is_empty());
    }
}
