/// Output table names. Each one is a directory below the output root.
pub const SONGS_TABLE: &str = "songs";
pub const ARTISTS_TABLE: &str = "artists";
pub const SONGPLAYS_TABLE: &str = "songplays";
pub const USERS_TABLE: &str = "users";
pub const TIME_TABLE: &str = "time";

/// All tables in write order
pub const ALL_TABLES: [&str; 5] = [
    SONGS_TABLE,
    ARTISTS_TABLE,
    SONGPLAYS_TABLE,
    USERS_TABLE,
    TIME_TABLE,
];

/// Value of `page` (compared case-insensitively) that marks a song play
pub const NEXT_SONG_PAGE: &str = "nextsong";

/// Directory name used for null partition values
pub const NULL_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// Marker file written once every file of a table is in place
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Low bits of a songplay id reserved for the per-partition counter
pub const SURROGATE_COUNTER_BITS: u32 = 33;

/// Default config file looked up next to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "etl.toml";
