use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode one `[len][bincode][crc32]` frame.
fn encode_frame(event: &Event) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut frame = Vec::with_capacity(payload.len() + 8);
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(frame)
}

/// Read one frame and its length in bytes. `Ok(None)` on clean EOF, a truncated
/// tail, a bad checksum, or an undecodable payload.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut word = [0u8; 4];
    if !read_or_eof(reader, &mut word)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(word) as usize];
    if !read_or_eof(reader, &mut payload)? || !read_or_eof(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    let frame_len = payload.len() as u64 + 8;
    Ok(bincode::deserialize::<Event>(&payload)
        .ok()
        .map(|event| (event, frame_len)))
}

fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Intact events in order, and the byte length of the intact prefix.
fn scan(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut len = 0;
    while let Some((event, frame_len)) = read_frame(&mut reader)? {
        events.push(event);
        len += frame_len;
    }
    Ok((events, len))
}

fn open_for_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Append-only log of room events.
///
/// Frame layout: `[u32: len][bincode: Event][u32: crc32]`, little endian. `len`
/// counts payload bytes only. A torn final frame after a crash fails either the
/// length read or the checksum; `open` cuts it off so new frames follow the last
/// intact one.
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Bytes known to be intact and synced.
    len: u64,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let (_, intact) = scan(path)?;
        let file = open_for_append(path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > intact {
            tracing::warn!(
                "truncating {} trailing bytes from {}",
                on_disk - intact,
                path.display()
            );
            file.set_len(intact)?;
            file.sync_all()?;
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
            len: intact,
            appends_since_compact: 0,
        })
    }

    /// Append one event and fsync. On failure the file is cut back to its last
    /// synced length, so a failed append never reappears on replay.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        let frame = encode_frame(event)?;
        let written = self
            .file
            .write_all(&frame)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            self.rollback()?;
            return Err(e);
        }
        self.len += frame.len() as u64;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Drop every byte past the last synced append.
    pub fn rollback(&mut self) -> io::Result<()> {
        self.file.set_len(self.len)?;
        self.file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn compact_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write a snapshot to the side file and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_path(path))?);
        for event in events {
            writer.write_all(&encode_frame(event)?)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the snapshot over the live log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::compact_path(&self.path), &self.path)?;
        self.file = open_for_append(&self.path)?;
        self.len = self.file.metadata()?.len();
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Every intact event in order. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        scan(path).map(|(events, _)| events)
    }
}
