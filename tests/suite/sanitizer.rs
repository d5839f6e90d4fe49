//! The public sanitizer API over a recorded-style server transcript.

use sieve_types::{Emitted, MessageAssembler, Sanitizer};

fn message(body: &str) -> Vec<u8> {
    format!("Content-Length: {}\r\n\r\n{body}", body.len()).into_bytes()
}

/// What a server that prints compiler output on stdout looks like on the wire.
fn transcript() -> (Vec<u8>, Vec<Vec<u8>>) {
    let messages = vec![
        message(r#"{"jsonrpc":"2.0","id":0,"result":{"capabilities":{"hoverProvider":true}}}"#),
        message(r#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3,"message":"Content-Length: 12"}}"#),
        message(r#"{"jsonrpc":"2.0","method":"textDocument/publishDiagnostics","params":{"uri":"file:///Main.idr","diagnostics":[]}}"#),
    ];

    let mut stream = Vec::new();
    stream.extend_from_slice(b"1/2: Building Prelude (Prelude.idr)\n");
    stream.extend_from_slice(&messages[0]);
    stream.extend_from_slice(b"Error: While processing right hand side of main. Content-Length: unknown\n");
    stream.extend_from_slice(&messages[1]);
    stream.extend_from_slice(&messages[2]);
    stream.extend_from_slice(b"Main> ");
    (stream, messages)
}

fn run(chunks: &[&[u8]]) -> (Vec<Vec<u8>>, Vec<u8>) {
    let mut sanitizer = Sanitizer::new();
    let mut assembler = MessageAssembler::new();
    let mut complete = Vec::new();
    let mut noise = Vec::new();

    for chunk in chunks {
        for segment in sanitizer.on_chunk(chunk) {
            match segment {
                Emitted::Noise(bytes) => noise.extend_from_slice(&bytes),
                frame => complete.extend(assembler.push(frame)),
            }
        }
    }
    let leftover = sanitizer.on_end();
    noise.extend(std::iter::repeat_n(b'?', leftover.pending_bytes));
    (complete, noise)
}

#[test]
fn whole_transcript_in_one_chunk() {
    let (stream, expected) = transcript();
    let (got, _) = run(&[stream.as_slice()]);
    assert_eq!(got, expected);
}

#[test]
fn every_two_way_split_gives_the_same_messages() {
    let (stream, expected) = transcript();
    for cut in 0..=stream.len() {
        let (head, tail) = stream.split_at(cut);
        let (got, _) = run(&[head, tail]);
        assert_eq!(got, expected, "split at {cut}");
    }
}

#[test]
fn byte_at_a_time() {
    let (stream, expected) = transcript();
    let chunks: Vec<&[u8]> = stream.chunks(1).collect();
    let (got, _) = run(&chunks);
    assert_eq!(got, expected);
}

#[test]
fn noise_and_messages_account_for_every_byte() {
    let (stream, expected) = transcript();
    let chunks: Vec<&[u8]> = stream.chunks(7).collect();
    let (got, noise) = run(&chunks);
    let message_bytes: usize = got.iter().map(Vec::len).sum();
    assert_eq!(got, expected);
    assert_eq!(message_bytes + noise.len(), stream.len());
}
