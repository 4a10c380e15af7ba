//! Diagnostic dump of a message's allocation.

use std::fmt::Write;

use crate::message::buffer::MessageBuf;

/// Render a region summary plus a hex/ASCII dump of the whole allocation.
pub fn dump_message(message: &MessageBuf) -> String {
    let layout = message.layout();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "message {{ size {} ({:#x}),",
        message.total_len(),
        message.total_len()
    );
    let _ = writeln!(
        out,
        "  data     {{ {:4} B @ {:#06x} }}",
        layout.data_len,
        layout.data_offset()
    );
    let _ = writeln!(
        out,
        "  descrip  {{ {:6} @ {:#06x} : {:?} }}",
        layout.descriptor_count,
        layout.descriptor_offset(),
        message.descriptors().to_vec()
    );
    let _ = writeln!(
        out,
        "  channels {{ {:6} @ {:#06x}, {} B }}",
        message.channel_count(),
        layout.channel_offset(),
        layout.channel_bytes
    );
    let _ = writeln!(out, "}}");

    for row in message.as_bytes().chunks(8) {
        for byte in row {
            let _ = write!(out, " {byte:02x}");
        }
        for _ in row.len()..8 {
            let _ = write!(out, "   ");
        }
        let _ = write!(out, "        ");
        for byte in row {
            let c = *byte as char;
            if c.is_ascii_graphic() || c == ' ' {
                let _ = write!(out, "{c}");
            } else {
                let _ = write!(out, ".");
            }
        }
        let _ = writeln!(out);
    }

    out
}
