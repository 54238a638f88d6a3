use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::RefseqError;

pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Opens `path` for line reading, decompressing `.gz` files on the fly.
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, RefseqError> {
    let file = File::open(path)
        .map_err(|err| RefseqError::Filesystem(format!("open {}: {err}", path.display())))?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Output sink that is either plain or gzip-encoded; `finish` flushes the
/// compressed trailer.
pub enum OutputWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputWriter {
    pub fn new(file: File, compress: bool) -> Self {
        let inner = BufWriter::new(file);
        if compress {
            OutputWriter::Gzip(GzEncoder::new(inner, Compression::default()))
        } else {
            OutputWriter::Plain(inner)
        }
    }

    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(mut writer) => writer.flush(),
            OutputWriter::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputWriter::Plain(writer) => writer.write(buf),
            OutputWriter::Gzip(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputWriter::Plain(writer) => writer.flush(),
            OutputWriter::Gzip(writer) => writer.flush(),
        }
    }
}

pub fn ensure_dir(path: &Path) -> Result<(), RefseqError> {
    fs::create_dir_all(path)
        .map_err(|err| RefseqError::Filesystem(format!("create {}: {err}", path.display())))
}

pub fn remove_file_if_exists(path: &Path) -> Result<(), RefseqError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(RefseqError::Filesystem(format!(
            "remove {}: {err}",
            path.display()
        ))),
    }
}
