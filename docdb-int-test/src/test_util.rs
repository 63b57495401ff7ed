use chrono::{DateTime, TimeZone, Utc};
use docdb::collection::Document;
use docdb::doc;
use docdb::errors::DocDbResult;
use docdb::Datastore;
use std::backtrace::Backtrace;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
/// `after` runs even when the test fails, so temporary files are removed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> DocDbResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> DocDbResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> DocDbResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());

                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Panic: {}", err_msg);
                    thread::sleep(Duration::from_millis(50 * attempt as u64));
                }
            }
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    path: Option<PathBuf>,
    db: Datastore,
}

impl TestContext {
    pub fn new(path: Option<PathBuf>, db: Datastore) -> Self {
        Self { path, db }
    }

    /// Data file of a file-backed context.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn db(&self) -> Datastore {
        self.db.clone()
    }

    /// Opens the data file again, as a new process would.
    pub fn reopen(&self) -> DocDbResult<Datastore> {
        match &self.path {
            Some(path) => Datastore::builder().filename(path).open(),
            None => Ok(self.db.clone()),
        }
    }
}

/// A fresh path in the temp directory. Nothing is created there.
pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("docdb-{}", id)).join("test.db")
}

#[cfg(not(feature = "memory"))]
pub fn create_test_context() -> DocDbResult<TestContext> {
    create_file_test_context()
}

#[cfg(feature = "memory")]
pub fn create_test_context() -> DocDbResult<TestContext> {
    Ok(TestContext::new(None, Datastore::in_memory()?))
}

/// A datastore persisted under [random_path], whatever the features.
pub fn create_file_test_context() -> DocDbResult<TestContext> {
    let path = random_path();
    let db = Datastore::builder().filename(&path).open()?;
    Ok(TestContext::new(Some(path), db))
}

pub fn cleanup(ctx: TestContext) -> DocDbResult<()> {
    let Some(path) = ctx.path() else {
        return Ok(());
    };
    let dir = path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| path.clone());
    drop(ctx);

    for retry in 0..5 {
        if !dir.exists() {
            return Ok(());
        }
        match fs::remove_dir_all(&dir) {
            Ok(_) => return Ok(()),
            Err(e) if retry < 4 => {
                eprintln!("Warning: Failed to remove {:?}: {}. Retrying...", dir, e);
                thread::sleep(Duration::from_millis(20 * (retry + 1)));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// Five game consoles, `id1` to `id5`.
pub fn create_console_docs() -> Vec<Document> {
    vec![
        doc! {
            _id: "id1",
            name: "Play Station 4",
            developer: { name: "Sony", country: "JP" },
            releaseDate: (date(2014, 3, 22)),
            media: "Blu-ray",
            portable: false,
            connectivity: ["HDMI", "USB", "Ethernet", "Wi-Fi", "Bluetooth"],
            peripheral: ["Play Station VR"],
        },
        doc! {
            _id: "id2",
            name: "Play Station Vita",
            developer: { name: "Sony", country: "JP" },
            releaseDate: (date(2012, 1, 17)),
            media: "Card",
            portable: true,
            connectivity: ["Wi-Fi", "Bluetooth", "3G"],
        },
        doc! {
            _id: "id3",
            name: "Nintendo 3DS",
            developer: { name: "Nintendo", country: "JP" },
            releaseDate: (date(2011, 3, 26)),
            media: "Card",
            portable: true,
            connectivity: ["Wi-Fi"],
        },
        doc! {
            _id: "id4",
            name: "Nintendo Switch",
            developer: { name: "Nintendo", country: "JP" },
            releaseDate: (date(2017, 4, 3)),
            media: "Card",
            portable: true,
            connectivity: ["HDMI", "USB", "Wi-Fi", "Bluetooth"],
        },
        doc! {
            _id: "id5",
            name: "Xbox One",
            developer: { name: "Microsoft", country: "US" },
            releaseDate: (date(2013, 12, 22)),
            media: "Blu-ray",
            portable: false,
            connectivity: ["HDMI", "USB", "Ethernet", "Wi-Fi"],
            peripheral: ["Kinect"],
        },
    ]
}

pub fn insert_console_documents(db: &Datastore) -> DocDbResult<()> {
    db.insert_many(create_console_docs())?;
    Ok(())
}

/// `_id`s of `docs`, in order.
pub fn ids(docs: &[Document]) -> Vec<String> {
    docs.iter().filter_map(|d| d.id().map(str::to_string)).collect()
}
