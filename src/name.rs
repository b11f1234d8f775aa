// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Textual domain name helpers.
//!
//! Every name handled by the resolver is normalized to a lower-case fully
//! qualified form ending in `.`; these helpers operate on that form.

/// Lowercases the ASCII letters of `name` and appends the root label if it is
/// missing.
pub(crate) fn to_lower_fqdn(name: &str) -> String {
    let mut fqdn = name.to_ascii_lowercase();
    if !fqdn.ends_with('.') {
        fqdn.push('.');
    }
    fqdn
}

/// Strips the leftmost label from `name`. The root has no parent.
pub(crate) fn parent(name: &str) -> Option<String> {
    if name == "." || name.is_empty() {
        return None;
    }
    match name.split_once('.') {
        Some((_, "")) | None => Some(".".to_owned()),
        Some((_, rest)) => Some(to_lower_fqdn(rest)),
    }
}

/// Number of labels in `name`; the root `.` has zero.
pub(crate) fn count_labels(name: &str) -> usize {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        return 0;
    }
    trimmed.split('.').count()
}

/// Number of trailing labels `a` and `b` have in common.
///
/// `shared_suffix_labels("www.example.com.", "ns1.example.com.")` is 2. This
/// is the primitive behind the bailiwick filter: a record is rejected when it
/// is shallower than the query name and shares too little of its suffix.
pub(crate) fn shared_suffix_labels(a: &str, b: &str) -> usize {
    let a_labels = a.trim_end_matches('.').rsplit('.');
    let b_labels = b.trim_end_matches('.').rsplit('.');
    a_labels
        .zip(b_labels)
        .take_while(|(x, y)| !x.is_empty() && x.eq_ignore_ascii_case(y))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_lower_fqdn() {
        assert_eq!(to_lower_fqdn("ANYTHING.com"), "anything.com.");
        assert_eq!(to_lower_fqdn("boO.net"), "boo.net.");
        assert_eq!(to_lower_fqdn("just.another.HORSE"), "just.another.horse.");
        assert_eq!(to_lower_fqdn("already.done."), "already.done.");
        assert_eq!(to_lower_fqdn(""), ".");
    }

    #[test]
    fn test_parent_walks_to_the_root() {
        assert_eq!(parent("www.example.com.").as_deref(), Some("example.com."));
        assert_eq!(parent("example.com.").as_deref(), Some("com."));
        assert_eq!(parent("com.").as_deref(), Some("."));
        assert_eq!(parent("."), None);
    }

    #[test]
    fn test_count_labels() {
        assert_eq!(count_labels("."), 0);
        assert_eq!(count_labels("com."), 1);
        assert_eq!(count_labels("example.com."), 2);
        assert_eq!(count_labels("a.b.example.com."), 4);
    }

    #[test]
    fn test_shared_suffix_labels() {
        assert_eq!(shared_suffix_labels("www.example.com.", "example.com."), 2);
        assert_eq!(shared_suffix_labels("com.", "example.com."), 1);
        assert_eq!(shared_suffix_labels("net.", "example.com."), 0);
        assert_eq!(shared_suffix_labels(".", "example.com."), 0);
        assert_eq!(
            shared_suffix_labels("ns1.example.com.", "www.example.com."),
            2
        );
    }
}
