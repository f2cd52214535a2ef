use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Int32Array, StringArray};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tempfile::TempDir;
use walkdir::WalkDir;

use songplay_etl::config::{OutputConfig, ParquetCompression};
use songplay_etl::infra::{FsSourceReader, ParquetTableWriter};
use songplay_etl::pipeline::storage::in_memory::InMemoryTableSink;
use songplay_etl::pipeline::storage::Cell;
use songplay_etl::pipeline::{Pipeline, RunReport, Stage};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn song_dir(&self) -> PathBuf {
        self.dir.path().join("input/song_data")
    }

    fn log_dir(&self) -> PathBuf {
        self.dir.path().join("input/log_data")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    fn write_lines(&self, path: &Path, values: &[Value]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let body: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        fs::write(path, body.join("\n")).unwrap();
    }

    fn write_catalog(&self, songs: &[Value]) {
        for (i, song) in songs.iter().enumerate() {
            self.write_lines(&self.song_dir().join(format!("A/B/song-{:03}.json", i)), &[song.clone()]);
        }
    }

    /// Replace the event logs with `partitions`, one file each.
    fn write_logs(&self, partitions: &[Vec<Value>]) {
        let _ = fs::remove_dir_all(self.log_dir());
        fs::create_dir_all(self.log_dir()).unwrap();
        for (i, events) in partitions.iter().enumerate() {
            self.write_lines(&self.log_dir().join(format!("2018/11/part-{:03}.json", i)), events);
        }
    }

    fn parquet_pipeline(&self) -> Pipeline {
        let source = FsSourceReader::new(self.song_dir(), self.log_dir());
        let sink = ParquetTableWriter::new(&OutputConfig {
            root: self.output(),
            compression: ParquetCompression::Snappy,
            max_rows_per_file: 1_000,
        });
        Pipeline::new(Arc::new(source), Arc::new(sink))
    }

    fn memory_pipeline(&self, sink: &InMemoryTableSink) -> Pipeline {
        let source = FsSourceReader::new(self.song_dir(), self.log_dir());
        Pipeline::new(Arc::new(source), Arc::new(sink.clone()))
    }
}

fn song_a() -> Value {
    json!({
        "num_songs": 1,
        "song_id": "S1",
        "title": "Song A",
        "artist_id": "AR1",
        "artist_name": "Artist A",
        "artist_location": "Somewhere",
        "artist_latitude": null,
        "artist_longitude": null,
        "year": 2000,
        "duration": 200.0
    })
}

fn next_song(ts: i64, user_id: &str, level: &str, first_name: &str) -> Value {
    json!({
        "artist": "Artist A",
        "auth": "Logged In",
        "firstName": first_name,
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Lovelace",
        "length": 200.0,
        "level": level,
        "location": "London",
        "method": "PUT",
        "page": "NextSong",
        "registration": 1540344794796.0,
        "sessionId": 42,
        "song": "Song A",
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id
    })
}

/// Every Parquet file under `dir`, recursively, sorted by path.
fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.unwrap().into_path())
        .filter(|path| path.extension().is_some_and(|e| e == "parquet"))
        .collect()
}

fn read_table(dir: &Path) -> Vec<RecordBatch> {
    parquet_files(dir)
        .into_iter()
        .flat_map(|path| {
            ParquetRecordBatchReaderBuilder::try_new(File::open(path).unwrap())
                .unwrap()
                .build()
                .unwrap()
                .map(|b| b.unwrap())
                .collect::<Vec<_>>()
        })
        .collect()
}

fn row_count(batches: &[RecordBatch]) -> usize {
    batches.iter().map(|b| b.num_rows()).sum()
}

fn strings(batches: &[RecordBatch], column: &str) -> Vec<Option<String>> {
    batches
        .iter()
        .flat_map(|b| {
            let array = b
                .column_by_name(column)
                .unwrap()
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap()
                .clone();
            (0..array.len())
                .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn digests(report: &RunReport) -> Vec<(String, Option<String>)> {
    report
        .tables
        .iter()
        .map(|t| (t.table.clone(), t.digest.clone()))
        .collect()
}

#[tokio::test]
async fn test_single_song_two_plays_scenario() {
    let ws = Workspace::new();
    ws.write_catalog(&[song_a()]);
    ws.write_logs(&[vec![
        next_song(1541106106796, "7", "free", "Ada"),
        next_song(1541107106796, "7", "paid", "Augusta"),
    ]]);

    let report = ws.parquet_pipeline().run(Stage::All).await.unwrap();
    assert!(report.succeeded());

    let out = ws.output();
    assert_eq!(row_count(&read_table(&out.join("songs"))), 1);
    assert!(out.join("songs/year=2000/artist_id=AR1").is_dir());

    let artists = read_table(&out.join("artists"));
    assert_eq!(row_count(&artists), 1);
    assert_eq!(strings(&artists, "name"), vec![Some("Artist A".to_string())]);

    let songplays = read_table(&out.join("songplays"));
    assert_eq!(row_count(&songplays), 2);
    assert!(strings(&songplays, "song_id").iter().all(|s| s.as_deref() == Some("S1")));
    assert!(strings(&songplays, "artist_id").iter().all(|s| s.as_deref() == Some("AR1")));

    // Only the later event's level survives in the partition layout
    assert!(out.join("users/gender=F/level=paid").is_dir());
    assert!(!out.join("users/gender=F/level=free").exists());
    let users = read_table(&out.join("users"));
    assert_eq!(row_count(&users), 1);
    assert_eq!(strings(&users, "first_name"), vec![Some("Augusta".to_string())]);
    let ids = users[0]
        .column_by_name("user_id")
        .unwrap()
        .as_any()
        .downcast_ref::<Int32Array>()
        .unwrap()
        .value(0);
    assert_eq!(ids, 7);

    assert_eq!(row_count(&read_table(&out.join("time"))), 2);
    assert!(out.join("time/year=2018/month=11").is_dir());
    for table in ["songs", "artists", "songplays", "users", "time"] {
        assert!(out.join(table).join("_SUCCESS").exists(), "{}", table);
    }
}

#[tokio::test]
async fn test_coinciding_timestamps_give_one_time_row() {
    let ws = Workspace::new();
    ws.write_catalog(&[song_a()]);
    ws.write_logs(&[vec![
        next_song(1541106106796, "7", "free", "Ada"),
        next_song(1541106106796, "8", "free", "Bea"),
    ]]);

    let sink = InMemoryTableSink::new();
    ws.memory_pipeline(&sink).run(Stage::Logs).await.unwrap();
    assert_eq!(sink.table("time").unwrap().row_count(), 1);
    assert_eq!(sink.table("songplays").unwrap().row_count(), 2);
    assert_eq!(sink.table("users").unwrap().row_count(), 2);
}

#[tokio::test]
async fn test_rerun_produces_identical_output() {
    let ws = Workspace::new();
    ws.write_catalog(&[song_a()]);
    ws.write_logs(&[
        vec![next_song(1541106106796, "7", "free", "Ada")],
        vec![next_song(1541107106796, "7", "paid", "Ada")],
    ]);

    let first = ws.parquet_pipeline().run(Stage::All).await.unwrap();
    let second = ws.parquet_pipeline().run(Stage::All).await.unwrap();
    assert_eq!(digests(&first).len(), 5);
    assert_eq!(digests(&first), digests(&second));
}

#[tokio::test]
async fn test_rerun_overwrites_previous_output() {
    let ws = Workspace::new();
    ws.write_catalog(&[song_a()]);
    ws.write_logs(&[vec![next_song(1541106106796, "7", "free", "Ada")]]);
    ws.parquet_pipeline().run(Stage::All).await.unwrap();
    assert!(ws.output().join("users/gender=F/level=free").is_dir());

    ws.write_logs(&[vec![next_song(1541107106796, "7", "paid", "Ada")]]);
    ws.parquet_pipeline().run(Stage::Logs).await.unwrap();
    assert!(!ws.output().join("users/gender=F/level=free").exists());
    assert!(ws.output().join("users/gender=F/level=paid").is_dir());
    assert!(ws.output().join("songs/_SUCCESS").exists());
}

#[tokio::test]
async fn test_unmatched_and_malformed_events_do_not_fail_the_run() {
    let ws = Workspace::new();
    ws.write_catalog(&[song_a()]);
    let dir = ws.log_dir().join("2018/11");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("events.json"),
        format!(
            "{}\n{{not json\n{}\n",
            next_song(1541106106796, "7", "free", "Ada"),
            json!({"page": "NextSong", "song": "Other", "artist": "Artist A", "ts": 1541106106999i64, "userId": "x"})
        ),
    )
    .unwrap();

    let sink = InMemoryTableSink::new();
    let report = ws.memory_pipeline(&sink).run(Stage::All).await.unwrap();
    let stats = report.log_stats.unwrap();
    assert_eq!(stats.unparseable_lines, 1);
    assert_eq!(stats.malformed_lines, 1);
    assert_eq!(stats.normalization.rows, 3);
    assert_eq!(stats.normalization.user_id_cast_failures, 1);
    assert_eq!(stats.resolution.unresolved_plays, 1);
    assert_eq!(sink.table("songplays").unwrap().row_count(), 1);
    assert_eq!(sink.table("users").unwrap().row_count(), 1);
}

#[tokio::test]
async fn test_invalid_bytes_and_non_object_lines_are_kept_as_empty_rows() {
    let ws = Workspace::new();
    ws.write_catalog(&[song_a()]);
    let dir = ws.log_dir().join("2018/11");
    fs::create_dir_all(&dir).unwrap();
    let mut content = format!("{}\n", next_song(1541106106796, "7", "free", "Ada")).into_bytes();
    content.extend_from_slice(b"{\"song\":\"Caf\xe3\",\"page\":\"NextSong\"}\n");
    content.extend_from_slice(b"[1,2]\n42\n");
    fs::write(dir.join("events.json"), content).unwrap();

    let sink = InMemoryTableSink::new();
    let report = ws.memory_pipeline(&sink).run(Stage::All).await.unwrap();
    assert!(report.succeeded());

    let stats = report.log_stats.unwrap();
    assert_eq!(stats.normalization.rows, 4);
    assert_eq!(stats.unparseable_lines, 1);
    assert_eq!(stats.malformed_lines, 3);
    assert_eq!(sink.table("songs").unwrap().row_count(), 1);
    assert_eq!(sink.table("songplays").unwrap().row_count(), 1);
}

/// Multiset of songplay rows with the surrogate key stripped.
fn songplay_content(sink: &InMemoryTableSink) -> Vec<Vec<Cell>> {
    let table = sink.table("songplays").unwrap();
    let id = table.column_index("songplay_id").unwrap();
    let mut rows: Vec<Vec<Cell>> = table
        .rows
        .into_iter()
        .map(|mut row| {
            row.remove(id);
            row
        })
        .collect();
    rows.sort_by_key(|row| format!("{:?}", row));
    rows
}

#[tokio::test]
async fn test_results_do_not_depend_on_partitioning() {
    let mut events = Vec::new();
    for i in 0..60i64 {
        let user = format!("{}", i % 7);
        let level = if i % 3 == 0 { "paid" } else { "free" };
        // User 0's two latest events share a timestamp with differing attributes
        let ts = if i == 49 || i == 56 { 1541200000000 } else { 1541100000000 + i * 1_000 };
        events.push(next_song(ts, &user, level, &format!("name-{}", i)));
    }

    let mut baseline = None;
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..4 {
        let mut shuffled = events.clone();
        shuffled.shuffle(&mut rng);
        let parts = rng.gen_range(1..=6);
        let size = shuffled.len().div_ceil(parts);
        let partitions: Vec<Vec<Value>> = shuffled.chunks(size).map(|c| c.to_vec()).collect();

        let ws = Workspace::new();
        ws.write_catalog(&[song_a()]);
        ws.write_logs(&partitions);
        let sink = InMemoryTableSink::new();
        ws.memory_pipeline(&sink).run(Stage::Logs).await.unwrap();

        let songplays = sink.table("songplays").unwrap();
        let id = songplays.column_index("songplay_id").unwrap();
        let ids: BTreeSet<_> = songplays
            .rows
            .iter()
            .map(|row| match &row[id] {
                Cell::Int64(Some(v)) => *v,
                other => panic!("unexpected id cell {:?}", other),
            })
            .collect();
        assert_eq!(ids.len(), 60);

        let outcome = (
            sink.table("users").unwrap(),
            sink.table("time").unwrap(),
            songplay_content(&sink),
        );
        match &baseline {
            None => baseline = Some(outcome),
            Some(expected) => assert_eq!(expected, &outcome),
        }
    }
}
