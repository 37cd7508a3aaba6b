use std::cmp::Ordering;
use std::path::Path;

use crate::error::{ErrorKind, Result};

/// Page number encoded in a file name, ignoring its extension.
///
/// The stem must be ASCII digits only (zero padding allowed) and fit in a
/// `u32`; anything else is not a page.
pub(crate) fn page_number(file_name: &str) -> Option<u32> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Check that `numbers` is exactly `1..=declared`, in any order.
pub(crate) fn check_sequence(numbers: &mut [u32], declared: u32) -> Result<()> {
    let found = numbers.len();
    match found.cmp(&(declared as usize)) {
        Ordering::Less => exn::bail!(ErrorKind::MissingPages { found, expected: declared }),
        Ordering::Greater => exn::bail!(ErrorKind::TooManyPages { found, expected: declared }),
        Ordering::Equal => {},
    }
    numbers.sort_unstable();
    for (expected, &found) in (1..).zip(numbers.iter()) {
        if expected != found {
            exn::bail!(ErrorKind::NonSequentialPages { expected, found });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.png", Some(1))]
    #[case("12.jpeg", Some(12))]
    #[case("007.webp", Some(7))]
    #[case("3", Some(3))]
    #[case("4.tar.gz", None)]
    #[case("metadata.json", None)]
    #[case("cover.png", None)]
    #[case("+1.png", None)]
    #[case("-1.png", None)]
    #[case(".png", None)]
    #[case("1 .png", None)]
    #[case("4294967295.png", Some(u32::MAX))]
    #[case("4294967296.png", None)]
    fn test_page_number(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(page_number(name), expected);
    }

    #[rstest]
    #[case(vec![], 0)]
    #[case(vec![1], 1)]
    #[case(vec![3, 1, 2], 3)]
    fn test_sequential(#[case] mut numbers: Vec<u32>, #[case] declared: u32) {
        check_sequence(&mut numbers, declared).unwrap();
    }

    #[test]
    fn test_missing_pages() {
        let err = check_sequence(&mut [1, 2], 3).unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingPages { found: 2, expected: 3 }));
        assert_eq!((*err).to_string(), "Some pages are missing in the folder (found 2 out of 3)");
    }

    #[test]
    fn test_too_many_pages() {
        let err = check_sequence(&mut [1, 2, 3, 4], 3).unwrap_err();
        assert!(matches!(&*err, ErrorKind::TooManyPages { found: 4, expected: 3 }));
    }

    #[rstest]
    #[case(vec![1, 2, 4], 3, 4)]
    #[case(vec![2, 3, 4], 1, 2)]
    #[case(vec![1, 1, 2], 2, 1)]
    #[case(vec![0, 1, 2], 1, 0)]
    fn test_non_sequential(#[case] mut numbers: Vec<u32>, #[case] expected: u32, #[case] found: u32) {
        let declared = numbers.len() as u32;
        let err = check_sequence(&mut numbers, declared).unwrap_err();
        assert!(
            matches!(&*err, ErrorKind::NonSequentialPages { expected: e, found: f } if *e == expected && *f == found),
            "{err:?}"
        );
    }
}
