use csv::ReaderBuilder;
use std::error::Error;
use std::fs::File;
use std::path::Path;

/// Column-oriented OHLCV bars. Derived price sources (`hl2`, `hlc3`, `ohlc4`,
/// `hlcc4`) are computed once at construction so every source can be borrowed
/// as a plain slice.
#[derive(Debug, Clone)]
pub struct Candles {
    pub timestamp: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    pub hl2: Vec<f64>,
    pub hlc3: Vec<f64>,
    pub ohlc4: Vec<f64>,
    pub hlcc4: Vec<f64>,
}

impl Candles {
    pub fn new(
        timestamp: Vec<i64>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Self {
        let hl2 = high
            .iter()
            .zip(low.iter())
            .map(|(&high, &low)| (high + low) / 2.0)
            .collect();
        let hlc3 = high
            .iter()
            .zip(low.iter())
            .zip(close.iter())
            .map(|((&high, &low), &close)| (high + low + close) / 3.0)
            .collect();
        let ohlc4 = open
            .iter()
            .zip(high.iter())
            .zip(low.iter())
            .zip(close.iter())
            .map(|(((&open, &high), &low), &close)| (open + high + low + close) / 4.0)
            .collect();
        let hlcc4 = high
            .iter()
            .zip(low.iter())
            .zip(close.iter())
            .map(|((&high, &low), &close)| (high + low + 2.0 * close) / 4.0)
            .collect();

        Candles {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            hl2,
            hlc3,
            ohlc4,
            hlcc4,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamp.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_empty()
    }

    pub fn select_candle_field(&self, field: &str) -> Result<&[f64], Box<dyn Error>> {
        source_type(self, field).ok_or_else(|| format!("Invalid field: {}", field).into())
    }
}

/// Resolves a price source name (case-insensitive) to its column.
#[inline]
pub fn source_type<'a>(candles: &'a Candles, source: &str) -> Option<&'a [f64]> {
    match source.to_ascii_lowercase().as_str() {
        "open" => Some(candles.open.as_slice()),
        "high" => Some(candles.high.as_slice()),
        "low" => Some(candles.low.as_slice()),
        "close" => Some(candles.close.as_slice()),
        "volume" => Some(candles.volume.as_slice()),
        "hl2" => Some(candles.hl2.as_slice()),
        "hlc3" => Some(candles.hlc3.as_slice()),
        "ohlc4" => Some(candles.ohlc4.as_slice()),
        "hlcc4" => Some(candles.hlcc4.as_slice()),
        _ => None,
    }
}

/// Reads `timestamp,open,close,high,low,volume` rows (header required).
pub fn read_candles_from_csv<P: AsRef<Path>>(file_path: P) -> Result<Candles, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut timestamp = Vec::new();
    let mut open = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();
    let mut close = Vec::new();
    let mut volume = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let field = |i: usize| {
            record
                .get(i)
                .map(str::trim)
                .ok_or_else(|| format!("Missing column {} in record {}", i, record.len()))
        };
        timestamp.push(field(0)?.parse::<i64>()?);
        open.push(field(1)?.parse::<f64>()?);
        close.push(field(2)?.parse::<f64>()?);
        high.push(field(3)?.parse::<f64>()?);
        low.push(field(4)?.parse::<f64>()?);
        volume.push(field(5)?.parse::<f64>()?);
    }

    Ok(Candles::new(timestamp, open, high, low, close, volume))
}
