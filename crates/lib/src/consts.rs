//! Crate-wide constants.

pub const APP_NAME: &str = "appsync";

/// File name of the resolved manifest copy kept inside the destination directory.
pub const LOCAL_MANIFEST_FILENAME: &str = "application.xml";

/// Suffix appended to a manifest file when it is replaced.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Marker file inside the destination directory left by an install that has not completed yet.
pub const INCOMPLETE_MARKER: &str = ".incomplete";

/// Key under which the install marker stores the chosen destination directory.
pub const PROGRAM_DIRECTORY_KEY: &str = "program-directory";

/// Log file in the destination directory that records the last launch command.
pub const LAUNCH_LOG_FILENAME: &str = "start.log";

/// Suffix of in-flight downloads; renamed away once the transfer completes.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Largest size a single transfer or archive entry may report to progress consumers.
pub const MAX_PROGRESS_UNIT: u64 = i32::MAX as u64;

/// Variable that a source directory's location template uses for the requested file name.
pub const FILENAME_VARIABLE: &str = "filename";

/// Variable pre-seeded into every option map with the user's home directory.
pub const USER_HOME_VARIABLE: &str = "userHome";

/// Variable set to the chosen destination directory during an install session.
pub const DEST_DIR_VARIABLE: &str = "destDir";

/// Variable set to the assembled classpath string during an install session.
pub const CLASSPATH_VARIABLE: &str = "classpath";

/// Default number of concurrent transfers within a phase.
pub const DEFAULT_PARALLELISM: usize = 4;

/// Buffer size used when streaming local copies.
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Variable set to the `file://` URL of the local manifest copy during an install session.
pub const CONFIG_FILE_URL_VARIABLE: &str = "configFileUrl";
