//! Cursor readers over trade/depth JSONL archives (spec.md §4.7). Grounded
//! in `barter-integration`'s file-backed stream adapters for the
//! open/decompress/line-split shape, generalised to the plain/gzip/zip
//! trio and the resumable-cursor contract this engine needs.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::marker::PhantomData;
use tradeforge_integration::{RecordSource, TimelineRecord};
use tradeforge_types::{PriceInt, QtyInt, Side, TimestampMs};
use zip::ZipArchive;

pub use tradeforge_integration::ReaderError;

/// Position within a reader's input files, resumable across a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct Cursor {
    pub file: String,
    pub entry: Option<String>,
    pub record_index: u64,
}

/// Records outside `[from_ms, to_ms]` are skipped without advancing the
/// cursor counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFilter {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

impl TimeFilter {
    fn admits(&self, ts: i64) -> bool {
        if let Some(from) = self.from_ms {
            if ts < from {
                return false;
            }
        }
        if let Some(to) = self.to_ms {
            if ts > to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub ts: TimestampMs,
    pub seq: u64,
    pub entry: Option<String>,
    pub price: PriceInt,
    pub qty: QtyInt,
    pub aggressor: Option<Side>,
    pub trade_ref: Option<String>,
}

impl TimelineRecord for TradeRecord {
    fn ts(&self) -> i64 {
        self.ts
    }
    fn seq(&self) -> u64 {
        self.seq
    }
    fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthRecord {
    pub ts: TimestampMs,
    pub seq: u64,
    pub entry: Option<String>,
    /// `qty == 0` denotes deletion of that price level.
    pub bids: Vec<(PriceInt, QtyInt)>,
    pub asks: Vec<(PriceInt, QtyInt)>,
}

impl TimelineRecord for DepthRecord {
    fn ts(&self) -> i64 {
        self.ts
    }
    fn seq(&self) -> u64 {
        self.seq
    }
    fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }
}

/// A type the generic [`CursorReader`] can parse one JSONL line into.
pub trait ParseRecord: Sized {
    fn parse_line(line: &str, price_scale: u32, qty_scale: u32) -> Result<(TimestampMs, Self), String>;
    fn with_meta(self, seq: u64, entry: Option<String>) -> Self;
}

#[derive(Deserialize)]
struct RawTrade {
    #[serde(alias = "timestamp", alias = "time")]
    ts: i64,
    price: serde_json::Value,
    qty: serde_json::Value,
    side: Option<String>,
    aggressor: Option<String>,
    #[serde(rename = "isBuyerMaker")]
    is_buyer_maker: Option<bool>,
    id: Option<String>,
}

fn value_to_decimal_string(value: &serde_json::Value) -> Result<String, String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("expected a number or decimal string, got {other}")),
    }
}

fn resolve_side(side: Option<&str>, aggressor: Option<&str>, is_buyer_maker: Option<bool>) -> Option<Side> {
    if let Some(raw) = side.or(aggressor) {
        return match raw.to_ascii_uppercase().as_str() {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        };
    }
    // Binance-style convention: if the buyer was the resting (maker) side,
    // the aggressor was the seller.
    is_buyer_maker.map(|buyer_is_maker| if buyer_is_maker { Side::Sell } else { Side::Buy })
}

impl ParseRecord for TradeRecord {
    fn parse_line(line: &str, price_scale: u32, qty_scale: u32) -> Result<(TimestampMs, Self), String> {
        let raw: RawTrade = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let price = PriceInt::from_decimal_str(&value_to_decimal_string(&raw.price)?, price_scale)
            .map_err(|e| e.to_string())?;
        let qty = QtyInt::from_decimal_str(&value_to_decimal_string(&raw.qty)?, qty_scale)
            .map_err(|e| e.to_string())?;
        let aggressor = resolve_side(raw.side.as_deref(), raw.aggressor.as_deref(), raw.is_buyer_maker);
        Ok((
            raw.ts,
            TradeRecord {
                ts: raw.ts,
                seq: 0,
                entry: None,
                price,
                qty,
                aggressor,
                trade_ref: raw.id,
            },
        ))
    }

    fn with_meta(mut self, seq: u64, entry: Option<String>) -> Self {
        self.seq = seq;
        self.entry = entry;
        self
    }
}

#[derive(Deserialize)]
struct RawDepth {
    ts: i64,
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLevel {
    Tuple(serde_json::Value, serde_json::Value),
    Object {
        price: serde_json::Value,
        qty: serde_json::Value,
    },
}

fn level_to_pair(level: RawLevel, price_scale: u32, qty_scale: u32) -> Result<(PriceInt, QtyInt), String> {
    let (price, qty) = match level {
        RawLevel::Tuple(p, q) => (p, q),
        RawLevel::Object { price, qty } => (price, qty),
    };
    let price = PriceInt::from_decimal_str(&value_to_decimal_string(&price)?, price_scale)
        .map_err(|e| e.to_string())?;
    let qty = QtyInt::from_decimal_str(&value_to_decimal_string(&qty)?, qty_scale).map_err(|e| e.to_string())?;
    Ok((price, qty))
}

impl ParseRecord for DepthRecord {
    fn parse_line(line: &str, price_scale: u32, qty_scale: u32) -> Result<(TimestampMs, Self), String> {
        let raw: RawDepth = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let bids = raw
            .bids
            .into_iter()
            .map(|l| level_to_pair(l, price_scale, qty_scale))
            .collect::<Result<Vec<_>, _>>()?;
        let asks = raw
            .asks
            .into_iter()
            .map(|l| level_to_pair(l, price_scale, qty_scale))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((
            raw.ts,
            DepthRecord {
                ts: raw.ts,
                seq: 0,
                entry: None,
                bids,
                asks,
            },
        ))
    }

    fn with_meta(mut self, seq: u64, entry: Option<String>) -> Self {
        self.seq = seq;
        self.entry = entry;
        self
    }
}

fn open_lines(path: &str) -> Result<(Box<dyn BufRead + Send>, Option<String>), ReaderError> {
    let to_io_err = |e: std::io::Error| ReaderError::Io {
        file: path.to_string(),
        source: e,
    };

    if path.ends_with(".jsonl.gz") {
        let file = File::open(path).map_err(to_io_err)?;
        Ok((Box::new(BufReader::new(GzDecoder::new(file))), None))
    } else if path.ends_with(".jsonl.zip") {
        let file = File::open(path).map_err(to_io_err)?;
        let mut archive = ZipArchive::new(file).map_err(|e| {
            ReaderError::Io {
                file: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            }
        })?;
        if archive.len() != 1 {
            return Err(ReaderError::MultiEntryArchive(path.to_string()));
        }
        let mut entry = archive.by_index(0).map_err(|e| ReaderError::Io {
            file: path.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        })?;
        let entry_name = entry.name().to_string();
        let mut contents = String::new();
        entry.read_to_string(&mut contents).map_err(to_io_err)?;
        Ok((
            Box::new(BufReader::new(std::io::Cursor::new(contents))),
            Some(entry_name),
        ))
    } else if path.ends_with(".jsonl") {
        let file = File::open(path).map_err(to_io_err)?;
        Ok((Box::new(BufReader::new(file)), None))
    } else {
        Err(ReaderError::UnsupportedArchive(path.to_string()))
    }
}

/// A restartable, order-preserving reader over a list of trade or depth
/// archives. Shared by [`TradeRecord`] and [`DepthRecord`] via
/// [`ParseRecord`].
pub struct CursorReader<T> {
    files: Vec<String>,
    file_index: usize,
    current: Option<Box<dyn BufRead + Send>>,
    current_file: String,
    current_entry: Option<String>,
    record_index: u64,
    global_seq: u64,
    price_scale: u32,
    qty_scale: u32,
    time_filter: TimeFilter,
    start_cursor: Option<Cursor>,
    start_cursor_applied: bool,
    assert_monotonic: bool,
    previous_ts: Option<i64>,
    _marker: PhantomData<T>,
}

impl<T: ParseRecord + Send> CursorReader<T> {
    pub fn new(
        files: Vec<String>,
        price_scale: u32,
        qty_scale: u32,
        time_filter: TimeFilter,
        start_cursor: Option<Cursor>,
        assert_monotonic: bool,
    ) -> Self {
        Self {
            files,
            file_index: 0,
            current: None,
            current_file: String::new(),
            current_entry: None,
            record_index: 0,
            global_seq: 0,
            price_scale,
            qty_scale,
            time_filter,
            start_cursor,
            start_cursor_applied: false,
            assert_monotonic,
            previous_ts: None,
            _marker: PhantomData,
        }
    }

    /// The cursor of the next record this reader will emit.
    pub fn current_cursor(&self) -> Cursor {
        Cursor {
            file: self.current_file.clone(),
            entry: self.current_entry.clone(),
            record_index: self.record_index,
        }
    }

    fn open_file_at(&mut self, index: usize) -> Result<(), ReaderError> {
        let path = self.files[index].clone();
        let (reader, entry) = open_lines(&path)?;
        self.current = Some(reader);
        self.current_file = path;
        self.current_entry = entry;
        self.record_index = 0;
        self.file_index = index;
        Ok(())
    }

    fn ensure_open(&mut self) -> Result<bool, ReaderError> {
        if self.current.is_some() {
            return Ok(true);
        }
        if self.file_index >= self.files.len() {
            return Ok(false);
        }
        self.open_file_at(self.file_index)?;
        Ok(true)
    }

    fn read_raw_line(&mut self) -> Result<Option<String>, ReaderError> {
        loop {
            if !self.ensure_open()? {
                return Ok(None);
            }
            let mut line = String::new();
            let bytes_read = self
                .current
                .as_mut()
                .unwrap()
                .read_line(&mut line)
                .map_err(|e| ReaderError::Io {
                    file: self.current_file.clone(),
                    source: e,
                })?;
            if bytes_read == 0 {
                self.current = None;
                self.file_index += 1;
                continue;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    fn apply_start_cursor(&mut self) -> Result<(), ReaderError> {
        self.start_cursor_applied = true;
        let Some(cursor) = self.start_cursor.clone() else {
            return Ok(());
        };

        let target_index = self
            .files
            .iter()
            .position(|f| f == &cursor.file)
            .ok_or_else(|| ReaderError::CursorNotFound(cursor.file.clone()))?;
        self.open_file_at(target_index)?;
        self.global_seq = cursor.record_index;

        for _ in 0..cursor.record_index {
            match self.next_filtered_line()? {
                Some(_) => {}
                None => break,
            }
        }
        self.record_index = cursor.record_index;
        Ok(())
    }

    /// Reads raw lines until one passes the time filter, without
    /// incrementing `record_index` for skipped ones.
    fn next_filtered_line(&mut self) -> Result<Option<(String, String, Option<String>)>, ReaderError> {
        loop {
            let Some(line) = self.read_raw_line()? else {
                return Ok(None);
            };
            let (ts, _) = T::parse_line(&line, self.price_scale, self.qty_scale).map_err(|reason| {
                ReaderError::Malformed {
                    file: self.current_file.clone(),
                    record_index: self.record_index,
                    reason,
                }
            })?;
            if !self.time_filter.admits(ts) {
                continue;
            }
            return Ok(Some((line, self.current_file.clone(), self.current_entry.clone())));
        }
    }

    fn read_next(&mut self) -> Result<Option<T>, ReaderError> {
        if !self.start_cursor_applied {
            self.apply_start_cursor()?;
        }

        let Some((line, file, entry)) = self.next_filtered_line()? else {
            return Ok(None);
        };
        let (ts, record) = T::parse_line(&line, self.price_scale, self.qty_scale).map_err(|reason| {
            ReaderError::Malformed {
                file: file.clone(),
                record_index: self.record_index,
                reason,
            }
        })?;

        if self.assert_monotonic {
            if let Some(previous) = self.previous_ts {
                if ts < previous {
                    return Err(ReaderError::NonMonotonic {
                        file,
                        record_index: self.record_index,
                        ts,
                        previous_ts: previous,
                    });
                }
            }
            self.previous_ts = Some(ts);
        }

        let seq = self.global_seq;
        self.global_seq += 1;
        self.record_index += 1;
        Ok(Some(record.with_meta(seq, entry)))
    }
}

#[async_trait]
impl<T: ParseRecord + Send> RecordSource for CursorReader<T> {
    type Item = T;

    async fn next(&mut self) -> Result<Option<T>, ReaderError> {
        self.read_next()
    }

    async fn close(&mut self) {
        self.current = None;
        self.file_index = self.files.len();
    }
}

pub type TradeReader = CursorReader<TradeRecord>;
pub type DepthReader = CursorReader<DepthRecord>;
