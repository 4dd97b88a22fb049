use guided_tutor::kernel::stream::{StreamFrame, StreamReassembler};

fn deltas(frames: &[StreamFrame]) -> String {
    frames
        .iter()
        .filter_map(|f| match f {
            StreamFrame::Delta(t) => Some(t.as_str()),
            StreamFrame::Done => None,
        })
        .collect()
}

fn sse(parts: &[&str]) -> String {
    let mut body: String = parts
        .iter()
        .map(|p| format!("data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n\n", serde_json::to_string(p).unwrap()))
        .collect();
    body.push_str("data: [DONE]\n\n");
    body
}

#[test]
fn test_line_split_inside_json_is_recovered() {
    let mut r = StreamReassembler::new();
    let mut frames = r.push(br#"data: {"choices":[{"delta":{"content":"Hel"#);
    assert!(frames.is_empty());
    frames.extend(r.push(b"lo\"}}]}\n"));

    assert_eq!(frames, vec![StreamFrame::Delta("Hello".into())]);
    assert_eq!(r.buffered(), 0);
}

#[test]
fn test_any_chunking_gives_same_text() {
    let body = sse(&["The ", "quick ", "brown ", "fox ⇒ ", "naïve ✓"]);
    let bytes = body.as_bytes();

    let mut whole = StreamReassembler::new();
    let expected = deltas(&whole.push(bytes));
    assert_eq!(expected, "The quick brown fox ⇒ naïve ✓");

    for size in [1, 2, 3, 5, 7, 13, 64] {
        let mut r = StreamReassembler::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(size) {
            frames.extend(r.push(chunk));
        }
        assert_eq!(deltas(&frames), expected, "chunk size {}", size);
        assert_eq!(frames.last(), Some(&StreamFrame::Done));
    }
}

#[test]
fn test_done_stops_reading() {
    let mut r = StreamReassembler::new();
    let frames = r.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n");

    assert_eq!(frames, vec![StreamFrame::Delta("a".into()), StreamFrame::Done]);
    assert!(r.is_finished());
    assert!(r.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n").is_empty());
}

#[test]
fn test_comments_blank_lines_and_crlf_are_skipped() {
    let mut r = StreamReassembler::new();
    let frames = r.push(b": keep-alive\r\n\r\nevent: ping\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n");
    assert_eq!(frames, vec![StreamFrame::Delta("ok".into())]);
}

#[test]
fn test_frames_without_content_are_ignored() {
    let mut r = StreamReassembler::new();
    let frames = r.push(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\ndata: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n");
    assert!(frames.is_empty());
    assert_eq!(r.buffered(), 0);
}

#[test]
fn test_multibyte_char_split_across_chunks() {
    let line = "data: {\"choices\":[{\"delta\":{\"content\":\"日本\"}}]}\n".as_bytes().to_vec();
    let split = line.iter().position(|b| *b == 0xE6).unwrap() + 1;

    let mut r = StreamReassembler::new();
    assert!(r.push(&line[..split]).is_empty());
    assert_eq!(r.push(&line[split..]), vec![StreamFrame::Delta("日本".into())]);
}

#[test]
fn test_unparsed_line_is_held_back() {
    let mut r = StreamReassembler::new();
    let frames = r.push(b"data: {\"choices\":\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n");
    assert!(frames.is_empty());
    assert!(r.buffered() > 0);
}

#[test]
fn test_finish_flushes_unterminated_line() {
    let mut r = StreamReassembler::new();
    assert!(r.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}").is_empty());

    let frames = r.finish();
    assert_eq!(frames, vec![StreamFrame::Delta("tail".into())]);
    assert!(r.is_finished());
    assert!(r.finish().is_empty());
}

#[test]
fn test_finish_discards_garbage() {
    let mut r = StreamReassembler::new();
    r.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: {broken\n");
    let frames = r.finish();
    assert!(frames.is_empty());
}
