//! Sharing traces.
//!
//! A sharing trace is a list of memory accesses, each tagged with the thread that performed it.

// Imports
use {
	crate::addr::ThreadId,
	anyhow::Context,
	byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt},
	falseshare_util::ReadByteArray,
	std::io,
};

/// Sharing trace reader
#[derive(Clone, Debug)]
pub struct SharingTraceReader<R> {
	/// Header
	header: Header,

	/// Records remaining
	records_remaining: u64,

	/// Reader
	reader: R,
}

impl<R: io::Read + io::Seek> SharingTraceReader<R> {
	/// Parses a sharing trace from a reader
	pub fn from_reader(mut reader: R) -> Result<Self, anyhow::Error> {
		// Read the magic
		let magic = reader.read_byte_array().context("Unable to read magic")?;
		anyhow::ensure!(magic == MAGIC, "Found wrong magic {magic:?}, expected {MAGIC:?}");

		// Read the header
		let header = Header::from_reader(&mut reader).context("Unable to read header")?;
		tracing::trace!(?header, "Parsed header");

		// Get the total number of records
		let total_records = {
			let magic_size = MAGIC.len() as u64;
			let header_size = Header::BYTE_SIZE as u64;
			let record_size = Record::BYTE_SIZE as u64;

			let records_start = reader.stream_position().context("Unable to get stream position")?;
			let total_actual_size = reader
				.seek(io::SeekFrom::End(0))
				.context("Unable to get stream length")?;
			reader
				.seek(io::SeekFrom::Start(records_start))
				.context("Unable to seek back to records")?;

			let total_expected_size = header
				.records
				.checked_mul(record_size)
				.and_then(|records_size| records_size.checked_add(magic_size + header_size));
			match total_expected_size {
				Some(total_expected_size) if total_expected_size == total_actual_size => (),
				Some(total_expected_size) => tracing::warn!(
					"Sharing trace size differs from expected. Found {total_actual_size}, expected \
					 {total_expected_size}"
				),
				None => tracing::warn!(
					"Sharing trace header claims {} records, which overflows the trace size. Found \
					 {total_actual_size}",
					header.records
				),
			}

			total_actual_size.saturating_sub(magic_size + header_size) / record_size
		};

		Ok(Self {
			header,
			records_remaining: total_records,
			reader,
		})
	}

	/// Reads the next record
	pub fn read_next(&mut self) -> Result<Option<Record>, anyhow::Error> {
		// If we're done, return `None`
		if self.records_remaining == 0 {
			return Ok(None);
		}

		// Else parse the next record and reduce the remaining records
		let record = Record::from_reader(&mut self.reader).context("Unable to read record")?;
		self.records_remaining -= 1;

		Ok(Some(record))
	}

	/// Returns the header
	pub fn header(&self) -> &Header {
		&self.header
	}

	/// Returns the remaining records
	pub fn records_remaining(&self) -> u64 {
		self.records_remaining
	}
}

/// Sharing trace writer
#[derive(Clone, Debug)]
pub struct SharingTraceWriter<W> {
	/// Block size hint
	block_size: u32,

	/// Records written
	records_written: u64,

	/// Writer
	writer: W,
}

impl<W: io::Write + io::Seek> SharingTraceWriter<W> {
	/// Creates a new writer.
	///
	/// `block_size` is only a hint for readers, 0 if unknown.
	pub fn new(mut writer: W, block_size: u32) -> Result<Self, anyhow::Error> {
		// Write the magic
		// Note: We rewind to ensure we write at the start, because we then
		//       later come back to write the header
		writer.rewind().context("Unable to rewind to start")?;
		writer.write_all(&MAGIC).context("Unable to write magic")?;

		// Write a placeholder header
		Header {
			records: 0,
			block_size,
		}
		.to_writer(&mut writer)
		.context("Unable to write placeholder header")?;

		Ok(Self {
			block_size,
			records_written: 0,
			writer,
		})
	}

	/// Writes a record
	pub fn write(&mut self, record: &Record) -> Result<(), anyhow::Error> {
		record.to_writer(&mut self.writer).context("Unable to write record")?;

		self.records_written += 1;
		Ok(())
	}

	/// Finishes writing
	pub fn finish(mut self) -> Result<W, anyhow::Error> {
		// Rewind the writer and write the header
		self.writer
			.seek(io::SeekFrom::Start(MAGIC.len() as u64))
			.context("Unable to seek to header")?;

		let header = Header {
			records:    self.records_written,
			block_size: self.block_size,
		};
		header.to_writer(&mut self.writer).context("Unable to write header")?;

		self.writer.seek(io::SeekFrom::End(0)).context("Unable to seek to end")?;
		self.writer.flush().context("Unable to flush writer")?;

		Ok(self.writer)
	}
}

/// Magic
pub const MAGIC: [u8; 8] = *b"FSHT v0\0";

/// Header
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Header {
	/// Total records
	pub records: u64,

	/// Block size hint of the machine that produced the trace, 0 if unknown
	pub block_size: u32,
}

impl Header {
	/// Returns the size of this header (including any padding)
	pub const BYTE_SIZE: usize = 0x10;

	/// Parses a header from a reader
	pub fn from_reader<R: io::Read>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let records = reader.read_u64::<LittleEndian>().context("Unable to read records")?;
		let block_size = reader
			.read_u32::<LittleEndian>()
			.context("Unable to read block size")?;
		let _padding = reader.read_u32::<LittleEndian>().context("Unable to read padding")?;

		Ok(Self { records, block_size })
	}

	/// Writes a header to a writer
	pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		writer
			.write_u64::<LittleEndian>(self.records)
			.context("Unable to write records")?;
		writer
			.write_u32::<LittleEndian>(self.block_size)
			.context("Unable to write block size")?;
		writer.write_u32::<LittleEndian>(0).context("Unable to write padding")?;

		Ok(())
	}
}

/// Record
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Record {
	/// Timestamp
	pub time: u64,

	/// Address
	pub addr: u64,

	/// Thread that performed the access
	pub thread: ThreadId,

	/// Access kind
	pub kind: RecordAccessKind,
}

impl Record {
	/// Returns the size of this record
	pub const BYTE_SIZE: usize = 0x18;

	/// Parses a record from a reader
	pub fn from_reader<R: io::Read>(reader: &mut R) -> Result<Self, anyhow::Error> {
		let time = reader.read_u64::<LittleEndian>().context("Unable to read time")?;
		let addr = reader.read_u64::<LittleEndian>().context("Unable to read address")?;
		let thread = reader.read_u32::<LittleEndian>().context("Unable to read thread")?;
		let flags = reader.read_u32::<LittleEndian>().context("Unable to read flags")?;

		let kind = match flags {
			0b01 => RecordAccessKind::Read,
			0b10 => RecordAccessKind::Write,
			0b11 => RecordAccessKind::ReadWrite,
			flags => anyhow::bail!("Unknown access flags: {flags:#b}"),
		};

		Ok(Self {
			time,
			addr,
			thread: ThreadId(thread),
			kind,
		})
	}

	/// Writes a record to a writer
	pub fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<(), anyhow::Error> {
		writer
			.write_u64::<LittleEndian>(self.time)
			.context("Unable to write time")?;
		writer
			.write_u64::<LittleEndian>(self.addr)
			.context("Unable to write address")?;
		writer
			.write_u32::<LittleEndian>(self.thread.0)
			.context("Unable to write thread")?;

		let flags = match self.kind {
			RecordAccessKind::Read => 0b01,
			RecordAccessKind::Write => 0b10,
			RecordAccessKind::ReadWrite => 0b11,
		};
		writer
			.write_u32::<LittleEndian>(flags)
			.context("Unable to write flags")?;

		Ok(())
	}
}

/// Record access kind
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RecordAccessKind {
	/// Read
	Read,

	/// Write
	Write,

	/// Read and write (e.g. read-modify-write instructions)
	ReadWrite,
}

impl RecordAccessKind {
	/// Returns if this access reads memory
	pub fn is_read(self) -> bool {
		matches!(self, Self::Read | Self::ReadWrite)
	}

	/// Returns if this access writes memory
	pub fn is_write(self) -> bool {
		matches!(self, Self::Write | Self::ReadWrite)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(time: u64, addr: u64, thread: u32, kind: RecordAccessKind) -> Record {
		Record {
			time,
			addr,
			thread: ThreadId(thread),
			kind,
		}
	}

	#[test]
	fn write_then_read() {
		let records = [
			record(0, 0x7fff_0000_1000, 0, RecordAccessKind::Read),
			record(5, 0x7fff_0000_1004, 1, RecordAccessKind::Write),
			record(9, 0x40, 31, RecordAccessKind::ReadWrite),
		];

		let mut writer = SharingTraceWriter::new(io::Cursor::new(vec![]), 64).expect("Unable to create writer");
		for record in &records {
			writer.write(record).expect("Unable to write record");
		}
		let mut cursor = writer.finish().expect("Unable to finish writing");
		assert_eq!(
			cursor.get_ref().len(),
			MAGIC.len() + Header::BYTE_SIZE + records.len() * Record::BYTE_SIZE
		);

		cursor.set_position(0);
		let mut reader = SharingTraceReader::from_reader(cursor).expect("Unable to parse trace");
		assert_eq!(reader.header().records, 3);
		assert_eq!(reader.header().block_size, 64);
		assert_eq!(reader.records_remaining(), 3);

		let read = std::iter::from_fn(|| reader.read_next().transpose())
			.collect::<Result<Vec<_>, _>>()
			.expect("Unable to read records");
		assert_eq!(read, records);
	}

	#[test]
	fn rejects_bad_magic() {
		let bytes = b"PINT v0\0".iter().copied().chain([0; 16]).collect::<Vec<_>>();
		assert!(SharingTraceReader::from_reader(io::Cursor::new(bytes)).is_err());
	}

	#[test]
	fn rejects_unknown_flags() {
		let mut bytes = vec![];
		record(0, 0x0, 0, RecordAccessKind::Read)
			.to_writer(&mut bytes)
			.expect("Unable to write record");
		bytes[20] = 0b100;
		assert!(Record::from_reader(&mut &bytes[..]).is_err());
	}

	#[test]
	fn trusts_size_over_header() {
		let mut writer = SharingTraceWriter::new(io::Cursor::new(vec![]), 0).expect("Unable to create writer");
		writer
			.write(&record(0, 0x0, 0, RecordAccessKind::Read))
			.expect("Unable to write record");
		let mut cursor = writer.finish().expect("Unable to finish writing");

		// Drop the record, keeping the header claiming one
		let len = cursor.get_ref().len() - Record::BYTE_SIZE;
		cursor.get_mut().truncate(len);
		cursor.set_position(0);

		let reader = SharingTraceReader::from_reader(cursor).expect("Unable to parse trace");
		assert_eq!(reader.header().records, 1);
		assert_eq!(reader.records_remaining(), 0);
	}

	#[test]
	fn trusts_size_over_short_header() {
		let mut writer = SharingTraceWriter::new(io::Cursor::new(vec![]), 0).expect("Unable to create writer");
		writer
			.write(&record(0, 0x0, 0, RecordAccessKind::Read))
			.expect("Unable to write record");
		let mut cursor = writer.finish().expect("Unable to finish writing");

		// Append a record the header doesn't know about
		record(1, 0x4, 1, RecordAccessKind::Write)
			.to_writer(&mut cursor)
			.expect("Unable to write record");
		cursor.set_position(0);

		let mut reader = SharingTraceReader::from_reader(cursor).expect("Unable to parse trace");
		assert_eq!(reader.header().records, 1);
		assert_eq!(reader.records_remaining(), 2);

		let read = std::iter::from_fn(|| reader.read_next().transpose())
			.collect::<Result<Vec<_>, _>>()
			.expect("Unable to read records");
		assert_eq!(read.len(), 2);
		assert_eq!(read[1].thread, ThreadId(1));
	}

	#[test]
	fn overflowing_header_count_is_not_fatal() {
		let mut bytes = MAGIC.to_vec();
		Header {
			records:    u64::MAX,
			block_size: 64,
		}
		.to_writer(&mut bytes)
		.expect("Unable to write header");
		record(0, 0x40, 2, RecordAccessKind::ReadWrite)
			.to_writer(&mut bytes)
			.expect("Unable to write record");

		let mut reader = SharingTraceReader::from_reader(io::Cursor::new(bytes)).expect("Unable to parse trace");
		assert_eq!(reader.header().records, u64::MAX);
		assert_eq!(reader.records_remaining(), 1);
		assert!(reader.read_next().expect("Unable to read record").is_some());
		assert!(reader.read_next().expect("Unable to read record").is_none());
	}
}
