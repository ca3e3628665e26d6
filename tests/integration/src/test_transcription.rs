//! Transcription relay tests: multipart uploads signed over the audio bytes.

#[cfg(test)]
mod tests {
    use reqwest::multipart::{Form, Part};

    use crate::{
        API_KEY, CannedResponse, MockUpstream, assert_cors, error_message, http_client,
        multipart_body, multipart_content_type, relay_config, signature_headers, signed_headers,
        spawn_relay,
    };

    const AUDIO: &[u8] = b"RIFF\x24\x08\x00\x00WAVEfmt \x10\x00\x00\x00\x01\x00\x01\x00";

    #[tokio::test]
    async fn test_should_relay_upload_signed_over_audio() {
        let upstream = MockUpstream::start(CannedResponse::json(r#"{"text":"hello"}"#))
            .await
            .unwrap();
        let relay = spawn_relay(relay_config(&upstream)).await.unwrap();
        let body = multipart_body(&[("model", "whisper-large-v3")], AUDIO);

        let resp = http_client()
            .post(format!("{relay}/v1/audio/transcriptions"))
            .headers(signed_headers(&multipart_content_type(), AUDIO))
            .body(body.clone())
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_cors(&resp);
        assert_eq!(resp.text().await.unwrap(), r#"{"text":"hello"}"#);

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/openai/v1/audio/transcriptions");
        let expected_auth = format!("Bearer {API_KEY}");
        assert_eq!(requests[0].header("authorization"), Some(expected_auth.as_str()));
        let expected_ct = multipart_content_type();
        assert_eq!(requests[0].header("content-type"), Some(expected_ct.as_str()));
        assert_eq!(requests[0].body.as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn test_should_relay_upload_encoded_by_reqwest_form() {
        let upstream = MockUpstream::start(CannedResponse::json(r#"{"text":"hi"}"#))
            .await
            .unwrap();
        let relay = spawn_relay(relay_config(&upstream)).await.unwrap();
        let form = Form::new()
            .text("model", "whisper-large-v3")
            .text("response_format", "json")
            .part(
                "file",
                Part::bytes(AUDIO.to_vec())
                    .file_name("recording.wav")
                    .mime_str("audio/wav")
                    .unwrap(),
            );

        let resp = http_client()
            .post(format!("{relay}/v1/audio/transcriptions"))
            .headers(signature_headers(AUDIO))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), r#"{"text":"hi"}"#);

        let requests = upstream.requests();
        assert_eq!(requests.len(), 1);
        let content_type = requests[0].header("content-type").unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = &requests[0].body;
        assert!(body.windows(AUDIO.len()).any(|w| w == AUDIO));
    }

    #[tokio::test]
    async fn test_should_accept_changed_text_fields_under_same_signature() {
        let upstream = MockUpstream::start(CannedResponse::json("{}")).await.unwrap();
        let relay = spawn_relay(relay_config(&upstream)).await.unwrap();
        let body = multipart_body(
            &[("model", "whisper-large-v3-turbo"), ("language", "de")],
            AUDIO,
        );

        let resp = http_client()
            .post(format!("{relay}/whisper"))
            .headers(signed_headers(&multipart_content_type(), AUDIO))
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_should_reject_tampered_audio() {
        let upstream = MockUpstream::start(CannedResponse::json("{}")).await.unwrap();
        let relay = spawn_relay(relay_config(&upstream)).await.unwrap();
        let mut tampered = AUDIO.to_vec();
        tampered[0] ^= 0x01;

        let resp = http_client()
            .post(format!("{relay}/whisper"))
            .headers(signed_headers(&multipart_content_type(), AUDIO))
            .body(multipart_body(&[("model", "whisper-large-v3")], &tampered))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_eq!(error_message(resp).await, "Unauthorized");
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_upload_without_file_part() {
        let upstream = MockUpstream::start(CannedResponse::json("{}")).await.unwrap();
        let relay = spawn_relay(relay_config(&upstream)).await.unwrap();
        let boundary = crate::BOUNDARY;
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nwhisper-large-v3\r\n--{boundary}--\r\n"
        );

        let resp = http_client()
            .post(format!("{relay}/whisper"))
            .headers(signed_headers(&multipart_content_type(), body.as_bytes()))
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert!(upstream.requests().is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_json_on_transcription_route() {
        let upstream = MockUpstream::start(CannedResponse::json("{}")).await.unwrap();
        let relay = spawn_relay(relay_config(&upstream)).await.unwrap();

        let resp = http_client()
            .post(format!("{relay}/v1/audio/transcriptions"))
            .headers(signed_headers("application/json", b"{}"))
            .body("{}")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 400);
        assert_eq!(
            error_message(resp).await,
            "Content-Type must be multipart/form-data"
        );
    }
}
