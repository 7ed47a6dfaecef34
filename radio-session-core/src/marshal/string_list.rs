/// Delimiter used when flattening string lists for fixed-buffer callers.
pub const LIST_DELIMITER: char = ',';

/// Join a string list into one delimited string, returning the joined
/// string and the number of items.
///
/// An empty list yields an empty string and a count of zero.
pub fn join_list<S: AsRef<str>>(items: &[S]) -> (String, usize) {
    join_list_with(items, LIST_DELIMITER)
}

pub fn join_list_with<S: AsRef<str>>(items: &[S], delimiter: char) -> (String, usize) {
    let mut joined = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            joined.push(delimiter);
        }
        joined.push_str(item.as_ref());
    }
    (joined, items.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_antenna_names() {
        let (joined, count) = join_list(&["TX/RX", "RX2"]);
        assert_eq!(joined, "TX/RX,RX2");
        assert_eq!(count, 2);
    }

    #[test]
    fn empty_list_is_empty_string() {
        let empty: [&str; 0] = [];
        assert_eq!(join_list(&empty), (String::new(), 0));
    }

    #[test]
    fn single_item_has_no_delimiter() {
        assert_eq!(join_list(&[String::from("internal")]), ("internal".to_string(), 1));
    }

    #[test]
    fn custom_delimiter() {
        let (joined, count) = join_list_with(&["type=test,serial=1", "type=test,serial=2"], ';');
        assert_eq!(joined, "type=test,serial=1;type=test,serial=2");
        assert_eq!(count, 2);
    }
}
