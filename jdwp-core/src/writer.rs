// Encoding of JDWP wire data
//
// The mirror of reader: big-endian, id widths from the negotiated sizes.

use bytes::{BufMut, BytesMut};

use crate::types::*;

/// Encoder for a command payload.
///
/// Accepts any id kind that widens into the family root, so call sites
/// can pass a `ThreadId` where the wire wants an object id.
pub struct Writer {
    buf: BytesMut,
    sizes: IdSizes,
}

impl Writer {
    pub fn new(sizes: IdSizes) -> Self {
        Self {
            buf: BytesMut::new(),
            sizes,
        }
    }

    /// The finished payload for a `CommandPacket`.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_u64(value.to_bits());
    }

    /// Write a JDWP string (4-byte length prefix + UTF-8 bytes, no
    /// terminator).
    pub fn write_string(&mut self, value: &str) {
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    /// Write the low `width` bytes of an id, big-endian. Widths are
    /// validated to 1..=8 at negotiation.
    fn write_id(&mut self, width: u8, raw: u64) {
        for shift in (0..width).rev() {
            self.buf.put_u8((raw >> (shift * 8)) as u8);
        }
    }

    pub fn write_object_id(&mut self, id: impl Into<ObjectId>) {
        self.write_id(self.sizes.object_id_size, id.into().0);
    }

    pub fn write_reference_type_id(&mut self, id: impl Into<ReferenceTypeId>) {
        self.write_id(self.sizes.reference_type_id_size, id.into().0);
    }

    pub fn write_method_id(&mut self, id: MethodId) {
        self.write_id(self.sizes.method_id_size, id.0);
    }

    pub fn write_field_id(&mut self, id: FieldId) {
        self.write_id(self.sizes.field_id_size, id.0);
    }

    pub fn write_frame_id(&mut self, id: FrameId) {
        self.write_id(self.sizes.frame_id_size, id.0);
    }

    pub fn write_location(&mut self, location: &Location) {
        self.write_u8(location.type_tag);
        self.write_reference_type_id(location.class_id);
        self.write_method_id(location.method_id);
        self.write_u64(location.index);
    }

    /// Write a tagged value: tag byte, then the payload. Void is the
    /// tag alone.
    pub fn write_value(&mut self, value: &Value) {
        self.write_u8(value.tag() as u8);
        match *value {
            Value::Void => {}
            Value::Byte(v) => self.write_u8(v as u8),
            Value::Char(v) => self.write_u16(v),
            Value::Short(v) => self.write_i16(v),
            Value::Int(v) => self.write_i32(v),
            Value::Long(v) => self.write_i64(v),
            Value::Float(v) => self.write_f32(v),
            Value::Double(v) => self.write_f64(v),
            Value::Boolean(v) => self.write_bool(v),
            Value::Object(id) => self.write_object_id(id),
            Value::String(id) => self.write_object_id(id),
            Value::Thread(id) => self.write_object_id(id),
            Value::ThreadGroup(id) => self.write_object_id(id),
            Value::ClassLoader(id) => self.write_object_id(id),
            Value::ClassObject(id) => self.write_object_id(id),
            Value::Array(id) => self.write_object_id(id),
        }
    }

    /// Write a counted sequence of tagged values.
    pub fn write_values(&mut self, values: &[Value]) {
        self.write_i32(values.len() as i32);
        for value in values {
            self.write_value(value);
        }
    }
}
