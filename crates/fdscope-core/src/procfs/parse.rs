//! Parsers for `/proc/<pid>` text files

use crate::types::ResourceLimits;

const OPEN_FILES_ROW: &str = "Max open files";

/// Extract the open-files row of `/proc/<pid>/limits`.
///
/// `unlimited` and unparsable values map to `None`.
#[must_use]
pub fn open_files_limits(limits: &str) -> ResourceLimits {
    limits
        .lines()
        .find_map(|line| line.strip_prefix(OPEN_FILES_ROW))
        .map_or_else(ResourceLimits::unknown, |rest| {
            let mut fields = rest.split_whitespace();
            ResourceLimits {
                soft: fields.next().and_then(limit_value),
                hard: fields.next().and_then(limit_value),
            }
        })
}

fn limit_value(field: &str) -> Option<u64> {
    field.parse().ok()
}

/// Real uid from the `Uid:` line of `/proc/<pid>/status`
#[must_use]
pub fn status_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// State letter from `/proc/<pid>/stat`.
///
/// `comm` may contain spaces and parentheses, so the state is read after the
/// last `)`.
#[must_use]
pub fn stat_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_files_row() {
        let limits = "Limit  Soft Limit  Hard Limit  Units\n\
                      Max processes             63704                63704                processes\n\
                      Max open files            1024                 4096                 files\n";
        assert_eq!(
            open_files_limits(limits),
            ResourceLimits {
                soft: Some(1024),
                hard: Some(4096)
            }
        );
    }

    #[test]
    fn unlimited_and_missing_rows() {
        let limits = "Max open files            unlimited            unlimited            files\n";
        assert_eq!(open_files_limits(limits), ResourceLimits::unknown());
        assert_eq!(open_files_limits("Max cpu time  unlimited  unlimited  seconds\n"), ResourceLimits::unknown());
        assert_eq!(open_files_limits(""), ResourceLimits::unknown());
    }

    #[test]
    fn uid_is_first_field() {
        let status = "Name:\tbash\nUmask:\t0022\nUid:\t1000\t1001\t1002\t1003\nGid:\t100\n";
        assert_eq!(status_uid(status), Some(1000));
        assert_eq!(status_uid("Name:\tx\n"), None);
    }

    #[test]
    fn stat_state_skips_tricky_comm() {
        assert_eq!(stat_state("42 (my (odd) proc) Z 1 42 42 0"), Some('Z'));
        assert_eq!(stat_state("7 (bash) S 1 7 7"), Some('S'));
        assert_eq!(stat_state("garbage"), None);
    }
}
