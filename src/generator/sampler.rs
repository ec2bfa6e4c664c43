//! Deterministic draws for tree planning.
//!
//! Every random decision (counts, owners, names, extensions, sizes,
//! timestamps) comes from a single ChaCha8 stream so that one seed fully
//! determines a tree.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{CountMode, SizeClass};

const MINUTES_DELTA: (i64, i64) = (1, 60);
const HOURS_DELTA: (i64, i64) = (1, 23);
/// Five years.
const DAYS_DELTA: (i64, i64) = (0, 1825);

const ASCII_LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const JP_LETTERS: &str = "世界中に存在するウェブサイトのうち";
const CYR_LETTERS: &str = "ЎBKEПPнroлшдў";

/// Extension families a file type is drawn from.
const FILE_CATEGORIES: &[(&str, &[&str])] = &[
    ("audio", &["aac", "mp3", "oga", "wav"]),
    ("video", &["avi", "mpeg", "3gp", "webm"]),
    ("txt", &["doc", "docx", "txt", "pdf", "rtf", "ppt"]),
    ("img", &["bmp", "gif", "jpeg", "png", "tif"]),
    ("app", &["exe", "bat", "sh"]),
    ("script", &["py", "js", "php", "tcl"]),
    ("src", &["c", "h", "cpp"]),
    ("bad", &["", "a5t3", "ss", "000", "Pнr", "世界中"]),
];

/// Per-directory draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelParams {
    pub dirs_count: usize,
    pub files_count: usize,
    /// Non-empty subset of the configured owners.
    pub owners: Vec<String>,
}

/// Per-file draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileParams {
    pub size: u64,
    pub extension: &'static str,
}

/// Seeded source of every random decision made while planning a tree.
pub struct TreeSampler {
    rng: ChaCha8Rng,
    counts: CountMode,
    owners: Vec<String>,
    file_sizes: Vec<SizeClass>,
    alphabet: Vec<char>,
}

impl TreeSampler {
    pub fn new(
        seed: u64,
        counts: CountMode,
        owners: Vec<String>,
        file_sizes: Vec<SizeClass>,
    ) -> Self {
        let alphabet = ASCII_LETTERS
            .chars()
            .chain(JP_LETTERS.chars())
            .chain(CYR_LETTERS.chars())
            .collect();
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            counts,
            owners,
            file_sizes,
            alphabet,
        }
    }

    /// Draws sub-directory and file counts plus an owner subset.
    pub fn level_params(&mut self) -> LevelParams {
        let (dirs_count, files_count) = match self.counts {
            CountMode::Fixed { dirs, files } => (dirs, files),
            CountMode::Random {
                min_dirs,
                max_dirs,
                min_files,
                max_files,
            } => (
                self.rng.random_range(min_dirs..=max_dirs),
                self.rng.random_range(min_files..=max_files),
            ),
        };
        LevelParams {
            dirs_count,
            files_count,
            owners: self.owner_sample(),
        }
    }

    /// Random non-empty subset of the owners, in random order.
    pub fn owner_sample(&mut self) -> Vec<String> {
        if self.owners.is_empty() {
            return Vec::new();
        }
        let take = self.rng.random_range(1..=self.owners.len());
        let mut shuffled = self.owners.clone();
        shuffled.shuffle(&mut self.rng);
        shuffled.truncate(take);
        shuffled
    }

    /// One owner picked from a fresh owner sample.
    pub fn pick_owner(&mut self) -> String {
        let sample = self.owner_sample();
        sample.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    /// One owner picked from an already drawn sample.
    pub fn pick_from(&mut self, owners: &[String]) -> String {
        owners.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    /// Draws a file extension and a size within +/-30% of a configured class.
    pub fn file_params(&mut self) -> FileParams {
        let extension = FILE_CATEGORIES
            .choose(&mut self.rng)
            .and_then(|(_, extensions)| extensions.choose(&mut self.rng))
            .copied()
            .unwrap_or("");

        let nominal = self
            .file_sizes
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(SizeClass::Small)
            .nominal_size();
        let size = self
            .rng
            .random_range(nominal * 7 / 10..=nominal * 13 / 10);

        FileParams { size, extension }
    }

    /// Random name of `length` characters.
    pub fn name(&mut self, length: usize) -> String {
        (0..length)
            .map(|_| self.alphabet[self.rng.random_range(0..self.alphabet.len())])
            .collect()
    }

    /// Epoch second between a few minutes and five years before `base`.
    pub fn timestamp(&mut self, base: i64) -> i64 {
        let minutes = self.rng.random_range(MINUTES_DELTA.0..=MINUTES_DELTA.1);
        let hours = self.rng.random_range(HOURS_DELTA.0..=HOURS_DELTA.1);
        let days = self.rng.random_range(DAYS_DELTA.0..=DAYS_DELTA.1);
        base - minutes * 60 - hours * 3600 - days * 86_400
    }

    /// Index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(seed: u64, counts: CountMode) -> TreeSampler {
        TreeSampler::new(
            seed,
            counts,
            vec!["root".to_string(), "admin".to_string(), "user".to_string()],
            vec![SizeClass::Small],
        )
    }

    #[test]
    fn test_sampler_deterministic() {
        let counts = CountMode::Random {
            min_dirs: 1,
            max_dirs: 5,
            min_files: 0,
            max_files: 10,
        };
        let mut a = sampler(42, counts.clone());
        let mut b = sampler(42, counts);
        for _ in 0..20 {
            assert_eq!(a.level_params(), b.level_params());
            assert_eq!(a.file_params(), b.file_params());
            assert_eq!(a.name(4), b.name(4));
            assert_eq!(a.timestamp(1_662_707_899), b.timestamp(1_662_707_899));
        }
    }

    #[test]
    fn test_fixed_counts_are_returned_verbatim() {
        let mut s = sampler(1, CountMode::Fixed { dirs: 3, files: 7 });
        let params = s.level_params();
        assert_eq!(params.dirs_count, 3);
        assert_eq!(params.files_count, 7);
    }

    #[test]
    fn test_random_counts_within_bounds() {
        let mut s = sampler(
            9,
            CountMode::Random {
                min_dirs: 2,
                max_dirs: 4,
                min_files: 10,
                max_files: 12,
            },
        );
        for _ in 0..100 {
            let params = s.level_params();
            assert!((2..=4).contains(&params.dirs_count));
            assert!((10..=12).contains(&params.files_count));
        }
    }

    #[test]
    fn test_owner_sample_is_non_empty_subset() {
        let mut s = sampler(3, CountMode::Fixed { dirs: 1, files: 1 });
        for _ in 0..50 {
            let owners = s.owner_sample();
            assert!(!owners.is_empty() && owners.len() <= 3);
            assert!(owners
                .iter()
                .all(|o| ["root", "admin", "user"].contains(&o.as_str())));
        }
        let owner = s.pick_owner();
        assert!(["root", "admin", "user"].contains(&owner.as_str()));
    }

    #[test]
    fn test_file_size_within_thirty_percent() {
        let mut s = sampler(5, CountMode::Fixed { dirs: 1, files: 1 });
        for _ in 0..100 {
            let params = s.file_params();
            assert!(params.size >= 71_680 && params.size <= 133_120);
            assert!(FILE_CATEGORIES
                .iter()
                .any(|(_, exts)| exts.contains(&params.extension)));
        }
    }

    #[test]
    fn test_name_length_counts_characters() {
        let mut s = sampler(11, CountMode::Fixed { dirs: 1, files: 1 });
        for _ in 0..50 {
            assert_eq!(s.name(4).chars().count(), 4);
            assert_eq!(s.name(2).chars().count(), 2);
        }
    }

    #[test]
    fn test_timestamp_window() {
        let mut s = sampler(13, CountMode::Fixed { dirs: 1, files: 1 });
        let base = 1_662_707_899;
        for _ in 0..100 {
            let ts = s.timestamp(base);
            assert!(ts <= base - 60 - 3600);
            assert!(ts >= base - 3600 - 23 * 3600 - 1825 * 86_400);
        }
    }
}
