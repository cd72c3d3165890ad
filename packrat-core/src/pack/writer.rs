//! Streaming binary pack writer
//!
//! Ratings are appended to the record region as they arrive while per-user
//! and per-item position lists accumulate in memory. `finish` then:
//! - sorts the records by timestamp in place if any arrived out of order
//! - writes the user and item index tables after the records
//! - back-patches the header counts and syncs the file
//!
//! A writer that fails (or is dropped without `finish`) leaves a file that
//! is not a valid pack; callers must discard it.

use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::format::BinaryFormat;
use super::header::PackHeader;
use super::index_table::write_index_table;
use super::sort::{SortAccess, quick_sort};
use crate::config::PackWriterConfig;
use crate::error::{Error, Result};
use crate::rating::Rating;

/// Outcome of a finished pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackSummary {
    pub rating_count: u32,
    pub user_count: u32,
    pub item_count: u32,
    /// Flag word of the final record layout
    pub flag_word: i16,
    /// Whether records were reordered by timestamp
    pub sorted: bool,
    pub file_size: u64,
}

/// Writes ratings into a binary pack file.
///
/// Not thread-safe; one writer owns its file until `finish`.
pub struct RatingPacker {
    path: PathBuf,
    output: BufWriter<File>,
    format: BinaryFormat,
    user_positions: FxHashMap<i64, Vec<u32>>,
    item_positions: FxHashMap<i64, Vec<u32>>,
    rating_count: u32,
    last_timestamp: i64,
    needs_sorting: bool,
    sorted: bool,
    record: Vec<u8>,
}

impl RatingPacker {
    /// Create (or truncate) a pack file at `path`.
    pub fn create(path: impl AsRef<Path>, config: &PackWriterConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = BinaryFormat::from_config(config);
        log::debug!("opening binary pack file {} as {}", path.display(), format);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut output = BufWriter::with_capacity(config.buffer_size.max(1), file);
        // counts are patched in by `finish`
        PackHeader::placeholder(format).write(&mut output)?;

        Ok(Self {
            path,
            output,
            format,
            user_positions: FxHashMap::default(),
            item_positions: FxHashMap::default(),
            rating_count: 0,
            last_timestamp: i64::MIN,
            needs_sorting: false,
            sorted: false,
            record: Vec::with_capacity(format.record_size()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current record layout (may widen as ratings arrive)
    pub fn format(&self) -> BinaryFormat {
        self.format
    }

    pub fn rating_count(&self) -> u32 {
        self.rating_count
    }

    /// Whether out-of-order timestamps have been seen and a sort is pending
    pub fn needs_sorting(&self) -> bool {
        self.needs_sorting
    }

    /// Append one rating.
    pub fn write_rating(&mut self, rating: &Rating) -> Result<()> {
        if self.sorted {
            return Err(Error::InvalidState(
                "cannot append ratings to a sorted pack".to_string(),
            ));
        }
        if self.rating_count >= i32::MAX as u32 {
            return Err(Error::CapacityExhausted);
        }
        if !self.format.accepts(rating) {
            let wider = self.format.widened_for(rating);
            log::info!(
                "rating ({}, {}) needs wider ids, upgrading {} to {}",
                rating.user,
                rating.item,
                self.format,
                wider
            );
            self.upgrade(wider)?;
        }

        self.record.clear();
        self.format.write_rating(rating, &mut self.record)?;
        self.output.write_all(&self.record)?;

        let index = self.rating_count;
        self.user_positions
            .entry(rating.user)
            .or_default()
            .push(index);
        self.item_positions
            .entry(rating.item)
            .or_default()
            .push(index);
        self.rating_count += 1;

        if self.format.has_timestamps() {
            if rating.timestamp < self.last_timestamp && !self.needs_sorting {
                log::debug!("found out-of-order timestamps, activating sorting");
                self.needs_sorting = true;
            }
            self.last_timestamp = rating.timestamp;
        }
        Ok(())
    }

    pub fn write_ratings<I>(&mut self, ratings: I) -> Result<()>
    where
        I: IntoIterator<Item = Rating>,
    {
        for rating in ratings {
            self.write_rating(&rating)?;
        }
        Ok(())
    }

    /// Rewrite every record written so far into a wider layout.
    ///
    /// Records are rewritten from the last to the first: a widened record
    /// only overlaps old records that come after it, which are already done.
    pub fn upgrade(&mut self, format: BinaryFormat) -> Result<()> {
        if !format.is_widening_of(&self.format) {
            return Err(Error::Precondition(format!(
                "cannot upgrade {} to narrower {}",
                self.format, format
            )));
        }
        if format == self.format {
            return Ok(());
        }

        let old = self.format;
        self.output.flush()?;
        let file = self.output.get_mut();
        let mut old_record = vec![0u8; old.record_size()];
        let mut new_record = Vec::with_capacity(format.record_size());
        for i in (0..self.rating_count).rev() {
            file.seek(SeekFrom::Start(old.record_position(i)))?;
            file.read_exact(&mut old_record)?;
            let rating = old.read_rating(&old_record);

            new_record.clear();
            format.write_rating(&rating, &mut new_record)?;
            file.seek(SeekFrom::Start(format.record_position(i)))?;
            file.write_all(&new_record)?;
        }
        file.seek(SeekFrom::Start(format.record_position(self.rating_count)))?;

        log::debug!("upgraded {} records to {}", self.rating_count, format);
        self.format = format;
        self.record = Vec::with_capacity(format.record_size());
        Ok(())
    }

    /// Sort the written records by timestamp, in place on disk.
    ///
    /// Equal timestamps keep their arrival order. Position lists are
    /// translated to the new record order. Further writes are rejected.
    pub fn sort(&mut self) -> Result<()> {
        if self.sorted {
            return Err(Error::InvalidState("ratings already sorted".to_string()));
        }
        if !self.format.has_timestamps() {
            return Err(Error::Precondition(
                "cannot sort a pack without timestamps".to_string(),
            ));
        }

        self.output.flush()?;
        let n = self.rating_count as usize;
        let mut order: Vec<u32> = (0..self.rating_count).collect();
        {
            let mut records = FileRecords::new(self.output.get_mut(), self.format, &mut order);
            quick_sort(&mut records, n)?;
        }

        // order[new] = old  ->  translation[old] = new
        let mut translation = vec![0u32; n];
        for (new, &old) in order.iter().enumerate() {
            translation[old as usize] = new as u32;
        }
        translate_positions(&mut self.user_positions, &translation);
        translate_positions(&mut self.item_positions, &translation);

        let end = self.format.record_position(self.rating_count);
        self.output.get_mut().seek(SeekFrom::Start(end))?;
        self.sorted = true;
        self.needs_sorting = false;
        Ok(())
    }

    /// Sort if needed, write the index tables and header, and close the file.
    pub fn finish(mut self) -> Result<PackSummary> {
        log::debug!("closing binary pack file {}", self.path.display());
        let sorted = if self.needs_sorting {
            log::info!("sorting {} ratings", self.rating_count);
            self.sort()?;
            true
        } else {
            self.sorted
        };

        write_index_table(&mut self.output, &self.user_positions)?;
        write_index_table(&mut self.output, &self.item_positions)?;
        self.output.flush()?;

        let header = PackHeader::new(
            self.format,
            self.rating_count,
            self.user_positions.len() as u32,
            self.item_positions.len() as u32,
        );
        let file = self.output.get_mut();
        let file_size = file.stream_position()?;
        file.seek(SeekFrom::Start(0))?;
        header.write(file)?;
        file.sync_all()?;

        log::info!(
            "packed {} ratings from {} users and {} items into {}",
            header.rating_count(),
            header.user_count(),
            header.item_count(),
            self.path.display()
        );

        Ok(PackSummary {
            rating_count: header.rating_count(),
            user_count: header.user_count(),
            item_count: header.item_count(),
            flag_word: self.format.flag_word(),
            sorted,
            file_size,
        })
    }
}

/// Write `ratings` to a new pack at `path` in one go.
pub fn pack<I>(path: impl AsRef<Path>, config: &PackWriterConfig, ratings: I) -> Result<PackSummary>
where
    I: IntoIterator<Item = Rating>,
{
    let mut packer = RatingPacker::create(path, config)?;
    packer.write_ratings(ratings)?;
    packer.finish()
}

fn translate_positions(map: &mut FxHashMap<i64, Vec<u32>>, translation: &[u32]) {
    for positions in map.values_mut() {
        for p in positions.iter_mut() {
            *p = translation[*p as usize];
        }
        positions.sort_unstable();
    }
}

/// Records in the pack file, compared by timestamp and swapped on disk.
///
/// `order[i]` tracks the arrival index of the record now at `i`; it breaks
/// timestamp ties and yields the translation once sorting is done.
struct FileRecords<'a> {
    file: &'a mut File,
    format: BinaryFormat,
    order: &'a mut [u32],
    first: Vec<u8>,
    second: Vec<u8>,
    first_rating: Rating,
    second_rating: Rating,
}

impl<'a> FileRecords<'a> {
    fn new(file: &'a mut File, format: BinaryFormat, order: &'a mut [u32]) -> Self {
        let size = format.record_size();
        Self {
            file,
            format,
            order,
            first: vec![0u8; size],
            second: vec![0u8; size],
            first_rating: Rating::default(),
            second_rating: Rating::default(),
        }
    }

    fn read_pair(&mut self, a: usize, b: usize) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.format.record_position(a as u32)))?;
        self.file.read_exact(&mut self.first)?;
        self.file
            .seek(SeekFrom::Start(self.format.record_position(b as u32)))?;
        self.file.read_exact(&mut self.second)?;
        Ok(())
    }
}

impl SortAccess for FileRecords<'_> {
    fn compare(&mut self, a: usize, b: usize) -> Result<Ordering> {
        self.read_pair(a, b)?;
        self.format
            .read_rating_into(&self.first, &mut self.first_rating);
        self.format
            .read_rating_into(&self.second, &mut self.second_rating);
        Ok(self
            .first_rating
            .cmp_timestamp(&self.second_rating)
            .then_with(|| self.order[a].cmp(&self.order[b])))
    }

    fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.read_pair(a, b)?;
        self.file
            .seek(SeekFrom::Start(self.format.record_position(b as u32)))?;
        self.file.write_all(&self.first)?;
        self.file
            .seek(SeekFrom::Start(self.format.record_position(a as u32)))?;
        self.file.write_all(&self.second)?;
        self.order.swap(a, b);
        Ok(())
    }
}
