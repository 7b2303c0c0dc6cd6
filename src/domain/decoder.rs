//! Notification Decoder
//!
//! Splits a notification payload into fixed-length packets and decodes each
//! one with the layout of the connected controller.

use crate::domain::models::{ControllerFrame, DeviceType};
use crate::domain::profiles::{layout_for, PacketLayout};
use std::slice::ChunksExact;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no packet layout for device type {0}")]
    UnsupportedDevice(DeviceType),
}

/// Decode every complete packet in `raw`.
///
/// Trailing bytes that do not fill a whole packet are dropped; a BLE stack may
/// deliver a partial packet and that is not an error.
pub fn decode(device_type: DeviceType, raw: &[u8]) -> Result<Frames<'_>, DecodeError> {
    let layout = layout_for(device_type).ok_or(DecodeError::UnsupportedDevice(device_type))?;
    Ok(Frames {
        layout,
        chunks: raw.chunks_exact(layout.packet_length),
    })
}

/// Lazy iterator over the frames of one payload.
#[derive(Debug)]
pub struct Frames<'a> {
    layout: PacketLayout,
    chunks: ChunksExact<'a, u8>,
}

impl Frames<'_> {
    /// Number of trailing bytes that will be discarded.
    pub fn discarded(&self) -> usize {
        self.chunks.remainder().len()
    }
}

impl Iterator for Frames<'_> {
    type Item = ControllerFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let packet = self.chunks.next()?;
        Some(decode_packet(&self.layout, packet))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Frames<'_> {}

/// `packet` is exactly `layout.packet_length` bytes long.
fn decode_packet(layout: &PacketLayout, packet: &[u8]) -> ControllerFrame {
    ControllerFrame {
        axis_x: packet[layout.axis_x],
        axis_y: packet[layout.axis_y],
        axis_z: layout.axis_z.map(|offset| packet[offset]),
        buttons: u16::from_le_bytes([packet[layout.buttons_low], packet[layout.buttons_high]]),
        frame_counter: packet[layout.frame_counter],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sdvx_packet() {
        let frames: Vec<_> = decode(DeviceType::Sdvx, &[128, 64, 0x05, 0x00, 7])
            .unwrap()
            .collect();
        assert_eq!(
            frames,
            vec![ControllerFrame {
                axis_x: 128,
                axis_y: 64,
                axis_z: None,
                buttons: 0x0005,
                frame_counter: 7,
            }]
        );
    }

    #[test]
    fn test_decode_back_to_back_packets() {
        let raw = [
            10, 0, 0x41, 0x02, 1, //
            11, 0, 0x00, 0x01, 2, //
            12, 0, 0x7f, 0x03, 3,
        ];
        let frames: Vec<_> = decode(DeviceType::Iidx, &raw).unwrap().collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].axis_x, 10);
        assert_eq!(frames[0].buttons, 0x0241);
        assert_eq!(frames[1].buttons, 0x0100);
        assert_eq!(frames[2].buttons, 0x037f);
        assert_eq!(
            frames.iter().map(|f| f.frame_counter).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_decode_pad_layout() {
        let raw = [0x34, 0x12, 1, 2, 3, 200];
        let frames: Vec<_> = decode(DeviceType::PopN, &raw).unwrap().collect();
        assert_eq!(
            frames,
            vec![ControllerFrame {
                axis_x: 1,
                axis_y: 2,
                axis_z: Some(3),
                buttons: 0x1234,
                frame_counter: 200,
            }]
        );

        let frames: Vec<_> = decode(DeviceType::GitadoraGuitar, &raw).unwrap().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].axis_z, Some(3));
    }

    #[test]
    fn test_trailing_bytes_are_dropped() {
        for len in 0..=23usize {
            let raw: Vec<u8> = (0..len as u8).collect();
            let frames = decode(DeviceType::Sdvx, &raw).unwrap();
            assert_eq!(frames.discarded(), len % 5);
            assert_eq!(frames.count(), len / 5);

            let frames = decode(DeviceType::PopN, &raw).unwrap();
            assert_eq!(frames.len(), len / 6);
        }
    }

    #[test]
    fn test_short_payload_yields_nothing() {
        let mut frames = decode(DeviceType::Iidx, &[1, 2, 3]).unwrap();
        assert_eq!(frames.discarded(), 3);
        assert!(frames.next().is_none());
    }

    #[test]
    fn test_frames_are_reconstructible_from_offsets() {
        let raw: Vec<u8> = (0..20).map(|i| (i * 13) as u8).collect();
        let layout = layout_for(DeviceType::Sdvx).unwrap();
        for (i, frame) in decode(DeviceType::Sdvx, &raw).unwrap().enumerate() {
            let packet = &raw[i * 5..i * 5 + 5];
            assert_eq!(frame.axis_x, packet[layout.axis_x]);
            assert_eq!(frame.axis_y, packet[layout.axis_y]);
            assert_eq!(
                frame.buttons,
                u16::from(packet[layout.buttons_low]) | (u16::from(packet[layout.buttons_high]) << 8)
            );
            assert_eq!(frame.frame_counter, packet[layout.frame_counter]);
        }
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        assert_eq!(
            decode(DeviceType::Unknown, &[0; 5]).unwrap_err(),
            DecodeError::UnsupportedDevice(DeviceType::Unknown)
        );
    }
}
