//! Matching compiler generated startup code classes to the user class that
//! most plausibly contains them.
//!
//! Several report schemas emit module initializers and closures as separate
//! pseudo-classes. The owner is taken to be the user class in the same file
//! whose first line is the closest one at or before the first line of the
//! startup class. Each schema only decides how a match is applied.

use std::collections::BTreeSet;

/// Name prefix of compiler generated startup code classes and namespaces.
pub const STARTUP_CODE_PREFIX: &str = "<StartupCode$";

pub fn is_startup_code(name: &str) -> bool {
    name.get(..STARTUP_CODE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(STARTUP_CODE_PREFIX))
}

/// File and first line a class occupies, as far as the report tells.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Footprint {
    file_id: Option<String>,
    first_line: Option<u32>,
}

impl Footprint {
    fn of<T, F, L>(class: &T, file_ids: &F, lines: &L) -> Self
    where
        F: Fn(&T) -> Vec<String>,
        L: Fn(&T) -> Vec<u32>,
    {
        let ids: BTreeSet<String> = file_ids(class).into_iter().collect();
        let file_id = if ids.len() == 1 {
            ids.into_iter().next()
        } else {
            None
        };
        Self {
            file_id,
            first_line: lines(class).into_iter().min(),
        }
    }
}

/// For every startup class, the index of the user class it belongs to.
///
/// A startup class is only matched when all its members reference exactly
/// one file and it has at least one line. Candidates are user classes in
/// that same single file whose first line is not after the startup class's
/// first line; the one with the largest such line wins, the earlier one on
/// ties. `None` means the owner cannot be determined.
pub fn find_owners<T, F, L>(startup: &[T], user: &[T], file_ids: F, lines: L) -> Vec<Option<usize>>
where
    F: Fn(&T) -> Vec<String>,
    L: Fn(&T) -> Vec<u32>,
{
    let user_footprints: Vec<Footprint> = user
        .iter()
        .map(|class| Footprint::of(class, &file_ids, &lines))
        .collect();

    startup
        .iter()
        .map(|class| {
            let footprint = Footprint::of(class, &file_ids, &lines);
            let file_id = footprint.file_id?;
            let target_line = footprint.first_line?;

            let mut closest: Option<(usize, u32)> = None;
            for (index, candidate) in user_footprints.iter().enumerate() {
                let (Some(candidate_file), Some(candidate_line)) =
                    (&candidate.file_id, candidate.first_line)
                else {
                    continue;
                };
                if *candidate_file != file_id || candidate_line > target_line {
                    continue;
                }
                if closest.map_or(true, |(_, line)| candidate_line > line) {
                    closest = Some((index, candidate_line));
                }
            }
            closest.map(|(index, _)| index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        files: Vec<&'static str>,
        lines: Vec<u32>,
    }

    fn fake(files: &[&'static str], lines: &[u32]) -> Fake {
        Fake {
            files: files.to_vec(),
            lines: lines.to_vec(),
        }
    }

    fn owners(startup: &[Fake], user: &[Fake]) -> Vec<Option<usize>> {
        find_owners(
            startup,
            user,
            |c: &Fake| c.files.iter().map(|f| f.to_string()).collect(),
            |c: &Fake| c.lines.clone(),
        )
    }

    #[test]
    fn test_nearest_preceding_class_wins() {
        let startup = [fake(&["F"], &[55, 50])];
        let user = [
            fake(&["F"], &[10, 12]),
            fake(&["F"], &[40]),
            fake(&["F"], &[60]),
        ];
        assert_eq!(owners(&startup, &user), vec![Some(1)]);
    }

    #[test]
    fn test_class_after_target_is_never_chosen() {
        let startup = [fake(&["F"], &[50])];
        let user = [fake(&["F"], &[60, 70])];
        assert_eq!(owners(&startup, &user), vec![None]);
    }

    #[test]
    fn test_same_line_counts_and_first_wins_ties() {
        let startup = [fake(&["F"], &[50])];
        let user = [fake(&["F"], &[50]), fake(&["F"], &[50])];
        assert_eq!(owners(&startup, &user), vec![Some(0)]);
    }

    #[test]
    fn test_file_must_match_and_be_unique() {
        let user = [
            fake(&["G"], &[10]),
            fake(&["F", "G"], &[5]),
            fake(&[], &[]),
        ];
        assert_eq!(owners(&[fake(&["F"], &[50])], &user), vec![None]);
        assert_eq!(owners(&[fake(&["F", "G"], &[50])], &user), vec![None]);
        assert_eq!(owners(&[fake(&["F", "F"], &[50])], &[fake(&["F"], &[1])]), vec![Some(0)]);
    }

    #[test]
    fn test_startup_without_lines_is_skipped() {
        let user = [fake(&["F"], &[1])];
        assert_eq!(owners(&[fake(&["F"], &[])], &user), vec![None]);
    }

    #[test]
    fn test_is_startup_code() {
        assert!(is_startup_code("<StartupCode$App>.$Program"));
        assert!(is_startup_code("<startupcode$app>"));
        assert!(!is_startup_code("Ns.Program"));
        assert!(!is_startup_code("<Start"));
    }
}
