use bytes::Bytes;
use futures_util::stream::{self, TryStreamExt};
use partwise::{
    EventStream, HeaderFields, Multipart, Part, SerializeStream, SizeLimit, StructuralEvent,
};

fn chunked(data: &[u8], size: usize) -> impl stream::Stream<Item = partwise::Result<Bytes>> {
    let chunks: Vec<Bytes> = data
        .chunks(size)
        .map(Bytes::copy_from_slice)
        .collect();
    stream::iter(chunks.into_iter().map(partwise::Result::Ok))
}

#[tokio::test]
async fn test_multipart_basic() {
    let data = "--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"My Field\"\r\n\r\nabcd\r\n--X-BOUNDARY\r\nContent-Disposition: form-data; name=\"File Field\"; filename=\"a-text-file.txt\"\r\nContent-Type: text/plain\r\n\r\nHello world\nHello\r\nWorld\rAgain\r\n--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(chunked(data.as_bytes(), 1), "X-BOUNDARY").unwrap();

    while let Some((idx, part)) = m.next_part_with_idx().await.unwrap() {
        if idx == 0 {
            assert_eq!(
                part.headers().get("content-disposition"),
                Some("form-data; name=\"My Field\"")
            );
            assert_eq!(part.content_type(), None);
            assert_eq!(part.text(), "abcd");
        } else if idx == 1 {
            assert_eq!(part.content_type(), Some(mime::TEXT_PLAIN));
            assert_eq!(part.text(), "Hello world\nHello\r\nWorld\rAgain");
        } else {
            panic!("unexpected part index {}", idx);
        }
    }
}

#[tokio::test]
async fn test_multipart_empty() {
    let data = "--X-BOUNDARY--\r\n";

    let mut m = Multipart::new(chunked(data.as_bytes(), 1), "X-BOUNDARY").unwrap();

    assert!(m.next_part().await.unwrap().is_none());
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_chunk_size_invariance() {
    let mut fields = HeaderFields::new();
    fields.append("Content-Disposition", "form-data; name=\"blob\"");
    fields.append("Content-Type", "application/octet-stream");
    let body: Vec<u8> = (0u16..256).map(|b| b as u8).collect();
    let parts = vec![
        Part::new(fields, body),
        Part::new(HeaderFields::new(), &b"tail\r\n-- not a boundary"[..]),
    ];

    let wire = partwise::serialize(&parts, "1nv4r14nce").unwrap();
    let reference = partwise::parse(&wire, "1nv4r14nce").unwrap();
    assert_eq!(reference, parts);

    for k in 1..=wire.len() {
        let mut m = Multipart::new(chunked(&wire, k), "1nv4r14nce").unwrap();
        let mut streamed = Vec::new();
        while let Some(part) = m.next_part().await.unwrap() {
            streamed.push(part);
        }
        assert_eq!(streamed, reference, "chunk size {}", k);
    }
}

#[tokio::test]
async fn test_three_part_form_in_16_byte_chunks() {
    let mut id = HeaderFields::new();
    id.append("Content-Disposition", "form-data; name=\"id\"");
    let mut address = HeaderFields::new();
    address.append("Content-Disposition", "form-data; name=\"address\"");
    address.append("Content-Type", "text/plain; charset=utf-8");
    let mut image = HeaderFields::new();
    image.append(
        "Content-Disposition",
        "form-data; name=\"profileImage\"; filename=\"photo.bin\"",
    );
    image.append("Content-Type", "application/octet-stream");

    let parts = vec![
        Part::new(id, &b"42"[..]),
        Part::new(address, &"123 Example Straße".as_bytes()[..]),
        Part::new(image, &b"\xFF\xD8\xFF\xE0\x00\x10\r\n--\x01\x02"[..]),
    ];

    let wire = partwise::serialize(&parts, "FormBoundary123").unwrap();

    let mut m = Multipart::new(chunked(&wire, 16), "FormBoundary123").unwrap();
    let mut streamed = Vec::new();
    while let Some(part) = m.next_part().await.unwrap() {
        streamed.push(part);
    }

    assert_eq!(streamed, partwise::parse(&wire, "FormBoundary123").unwrap());
    assert_eq!(streamed.len(), 3);
    assert_eq!(streamed[1].text(), "123 Example Straße");
    assert_eq!(&streamed[2].body()[..], b"\xFF\xD8\xFF\xE0\x00\x10\r\n--\x01\x02");
}

#[tokio::test]
async fn test_per_part_size_cap() {
    let data = "--b\r\n\r\n0123456789\r\n--b--\r\n";
    let limit = SizeLimit::new().per_part(4);

    let mut m = Multipart::with_size_limit(chunked(data.as_bytes(), 3), "b", limit).unwrap();

    let err = m.next_part().await.unwrap_err();
    assert_eq!(err, partwise::Error::InvalidBody { limit: 4 });
    // No partial part is yielded afterwards.
    assert!(m.next_part().await.unwrap().is_none());
}

#[tokio::test]
async fn test_whole_stream_size_cap() {
    let data = "--b\r\n\r\n0123456789\r\n--b--\r\n";
    let limit = SizeLimit::new().whole_stream(8);

    let mut m = Multipart::with_size_limit(chunked(data.as_bytes(), 3), "b", limit).unwrap();

    let err = m.next_part().await.unwrap_err();
    assert_eq!(err, partwise::Error::StreamSizeExceeded { limit: 8 });
}

#[tokio::test]
async fn test_truncated_stream() {
    let data = "--b\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\nabc";

    let mut m = Multipart::new(chunked(data.as_bytes(), 5), "b").unwrap();

    assert_eq!(
        m.next_part().await.unwrap_err(),
        partwise::Error::UnexpectedEof
    );
}

#[tokio::test]
async fn test_event_stream_order() {
    let data = "--b\r\nA: 1\r\nB: 2\r\n\r\nbody\r\n--b--\r\n";

    let mut events = EventStream::new(chunked(data.as_bytes(), 1), "b").unwrap();
    let mut seen = Vec::new();
    while let Some(event) = events.next_event().await.unwrap() {
        seen.push(event);
    }

    assert_eq!(seen.first(), Some(&StructuralEvent::Boundary { is_final: false }));
    assert_eq!(seen.last(), Some(&StructuralEvent::Boundary { is_final: true }));

    let names: Vec<_> = seen
        .iter()
        .filter_map(|event| match event {
            StructuralEvent::HeaderField { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["A", "B"]);

    let body: Vec<u8> = seen
        .iter()
        .filter_map(|event| match event {
            StructuralEvent::BodyChunk(bytes) => Some(&bytes[..]),
            _ => None,
        })
        .flatten()
        .copied()
        .collect();
    assert_eq!(body, b"body");
}

#[tokio::test]
async fn test_serialize_stream_matches_serialize() {
    let mut fields = HeaderFields::new();
    fields.append("Content-Type", "text/plain");
    let parts = vec![
        Part::new(fields, &b"hello"[..]),
        Part::new(HeaderFields::new(), &b"world"[..]),
    ];
    let reference = partwise::serialize(&parts, "b").unwrap();

    let mut events = Vec::new();
    for part in &parts {
        events.push(StructuralEvent::Boundary { is_final: false });
        for (name, value) in part.headers().iter() {
            events.push(StructuralEvent::HeaderField {
                name: name.to_owned(),
                value: value.to_owned(),
            });
        }
        events.push(StructuralEvent::BodyChunk(part.body().clone()));
    }
    events.push(StructuralEvent::Boundary { is_final: true });

    let source = stream::iter(events.into_iter().map(partwise::Result::Ok));
    let mut chunks = SerializeStream::new(source, "b").unwrap();

    let mut wire = Vec::new();
    while let Some(chunk) = chunks.next_chunk().await.unwrap() {
        wire.extend_from_slice(&chunk);
    }

    assert_eq!(wire, reference);
}

#[tokio::test]
async fn test_serialize_stream_detects_missing_final_boundary() {
    let events = vec![
        StructuralEvent::Boundary { is_final: false },
        StructuralEvent::BodyChunk(Bytes::from_static(b"dangling")),
    ];
    let source = stream::iter(events.into_iter().map(partwise::Result::Ok));
    let mut chunks = SerializeStream::new(source, "b").unwrap();

    let mut outcome = Ok(());
    while let Some(next) = chunks.try_next().await.transpose() {
        if let Err(err) = next {
            outcome = Err(err);
            break;
        }
    }
    assert_eq!(outcome.unwrap_err(), partwise::Error::UnexpectedEof);
}

#[tokio::test]
async fn test_repeated_header_names_survive_round_trip() {
    let data = "--b\r\nX-Tag: one\r\nX-Tag: two\r\n\r\n.\r\n--b--\r\n";

    let mut m = Multipart::new(chunked(data.as_bytes(), 2), "b").unwrap();
    let part = m.next_part().await.unwrap().unwrap();

    assert_eq!(
        part.headers().get_all("x-tag").collect::<Vec<_>>(),
        vec!["one", "two"]
    );

    let wire = partwise::serialize(&[part], "b").unwrap();
    assert_eq!(&wire[..], data.as_bytes());
}

#[tokio::test]
async fn test_header_map_interop() {
    let data = "--b\r\nContent-Type: text/plain\r\nX-Tag: one\r\n\r\nhi\r\n--b--\r\n";

    let mut m = Multipart::new(chunked(data.as_bytes(), 4), "b").unwrap();
    let part = m.next_part().await.unwrap().unwrap();

    let map = part.headers().to_header_map().unwrap();
    assert_eq!(map.get(http::header::CONTENT_TYPE).unwrap(), "text/plain");

    let fields = HeaderFields::from_header_map(&map).unwrap();
    assert_eq!(fields.get("x-tag"), Some("one"));
}

#[cfg(feature = "json")]
#[tokio::test]
async fn test_part_json() {
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
        age: u8,
    }

    let data = "--b\r\nContent-Type: application/json\r\n\r\n{\"name\":\"alice\",\"age\":30}\r\n--b--\r\n";

    let mut m = Multipart::new(chunked(data.as_bytes(), 7), "b").unwrap();
    let part = m.next_part().await.unwrap().unwrap();

    assert_eq!(
        part.json::<User>().unwrap(),
        User {
            name: "alice".to_owned(),
            age: 30
        }
    );
}

#[cfg(feature = "tokio-io")]
#[tokio::test]
async fn test_with_reader() {
    let data: &[u8] = b"--b\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\nvalue\r\n--b--\r\n";

    let mut m = Multipart::with_reader(data, "b").unwrap();

    let part = m.next_part().await.unwrap().unwrap();
    assert_eq!(part.text(), "value");
    assert!(m.next_part().await.unwrap().is_none());
}
