/// Dataset identifier used in the collection log (e.g. "ETH_ohlcv_1h").
pub type DatasetId = String;
