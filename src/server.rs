use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::gemini::VisionModel;
use crate::pipeline::{Analyzer, SandwichReport, Upload};
use crate::retry::RetryPolicy;
use crate::symmetry::SymmetryScorer;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn VisionModel>,
    pub scorer: SymmetryScorer,
    pub comment_retry: RetryPolicy,
    pub max_upload_bytes: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_image))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<SandwichReport>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() && field.name() != Some("image") {
            continue;
        }

        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;

        let analyzer = Analyzer {
            model: state.model.as_ref(),
            scorer: state.scorer,
            comment_retry: state.comment_retry,
        };
        let report = analyzer
            .analyze(Upload {
                bytes: bytes.to_vec(),
                mime_type,
            })
            .await?;

        tracing::info!(
            "✅ Scored {:.2} in {}ms (sandwich: {})",
            report.score,
            report.processing_time_ms,
            report.is_sandwich
        );
        return Ok(Json(report));
    }

    Err(AppError::MissingImage)
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>🥪 Sandwich Symmetry Evaluator</title>
    <style>
        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(to right, #16222A, #3A6073);
            color: white;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .container {
            background: #1f1f2e;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.4);
            max-width: 800px;
            width: 100%;
            padding: 40px;
        }

        h1 {
            margin-bottom: 10px;
            font-size: 2em;
        }

        .subtitle {
            color: #aaa;
            margin-bottom: 30px;
            font-size: 0.9em;
        }

        .upload-area {
            border: 3px dashed #555;
            border-radius: 15px;
            padding: 60px 20px;
            text-align: center;
            cursor: pointer;
            transition: all 0.3s;
            background: #222;
        }

        .upload-area:hover,
        .upload-area.dragover {
            border-color: #7b2ff7;
        }

        .upload-icon {
            font-size: 4em;
            margin-bottom: 20px;
        }

        input[type="file"] {
            display: none;
        }

        .loading, .error, .verdict, .rejected {
            display: none;
        }

        .loading {
            text-align: center;
            padding: 40px;
        }

        .spinner {
            border: 4px solid #333;
            border-top: 4px solid #7b2ff7;
            border-radius: 50%;
            width: 50px;
            height: 50px;
            animation: spin 1s linear infinite;
            margin: 0 auto 20px;
        }

        @keyframes spin {
            0% { transform: rotate(0deg); }
            100% { transform: rotate(360deg); }
        }

        .preview-image, .heatmap {
            max-width: 100%;
            border-radius: 10px;
            margin-top: 20px;
        }

        .symmetry-box {
            background-color: #1f1f2e;
            padding: 20px;
            border-radius: 15px;
            text-align: center;
            box-shadow: 0 0 20px #7b2ff7;
            margin-top: 20px;
        }

        .symmetry-box .score {
            color: #00FFAD;
        }

        .high-score {
            animation: glow 1s ease-in-out infinite alternate;
        }

        @keyframes glow {
            from { text-shadow: 0 0 10px #00ffcc, 0 0 20px #00ffcc; }
            to { text-shadow: 0 0 20px #00ffee, 0 0 30px #00ffee; }
        }

        .analysis {
            margin-top: 20px;
            line-height: 1.6;
        }

        .comment {
            background: #16382a;
            border-radius: 10px;
            padding: 15px;
            margin-top: 20px;
        }

        .advisory {
            color: #f5c542;
            font-size: 0.9em;
            margin-top: 10px;
        }

        .error, .rejected {
            background: #3a1f1f;
            border: 2px solid #c33;
            padding: 15px;
            border-radius: 10px;
            margin-top: 20px;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>🥪 Sandwich Symmetry Evaluator</h1>
        <p class="subtitle">Upload your sandwich masterpiece</p>

        <div class="upload-area" id="uploadArea">
            <div class="upload-icon">📷</div>
            <div>Drag and drop file here</div>
            <div class="subtitle">JPG, JPEG or PNG</div>
            <input type="file" id="fileInput" accept="image/jpeg,image/png">
        </div>

        <img id="previewImage" class="preview-image" alt="Uploaded Sandwich" hidden>

        <div class="loading" id="loading">
            <div class="spinner"></div>
            <p>Processing your sandwich with advanced AI...</p>
        </div>

        <div class="error" id="error"></div>

        <div class="rejected" id="rejected">
            <p>🚫 That doesn't look like a sandwich. Please upload something more edible.</p>
            <p class="analysis">AI's observation: <span id="observation"></span></p>
        </div>

        <div id="advisories"></div>

        <div class="verdict" id="verdict">
            <div class="symmetry-box" id="scoreBox">
                <h3>📊 Symmetry Score (Cropped): <span class="score" id="score"></span> / 100</h3>
            </div>
            <p class="analysis"><strong>AI's Overall Sandwich Analysis:</strong> <span id="overall"></span></p>
            <p class="analysis"><strong>AI's Filling Symmetry Analysis:</strong> <span id="filling"></span></p>
            <div class="comment">💬 <span id="comment"></span></div>
            <img id="heatmap" class="heatmap" alt="Asymmetry heatmap">
        </div>
    </div>

    <script>
        const uploadArea = document.getElementById('uploadArea');
        const fileInput = document.getElementById('fileInput');
        const previewImage = document.getElementById('previewImage');
        const loading = document.getElementById('loading');
        const errorDiv = document.getElementById('error');
        const rejected = document.getElementById('rejected');
        const verdict = document.getElementById('verdict');
        const advisories = document.getElementById('advisories');

        function pickSandwich(file) {
            if (!file || !['image/jpeg', 'image/png'].includes(file.type)) {
                errorDiv.textContent = 'Please choose a JPG or PNG photo of your sandwich.';
                errorDiv.style.display = 'block';
                return;
            }
            handleFile(file);
        }

        uploadArea.onclick = () => fileInput.click();
        fileInput.onchange = () => pickSandwich(fileInput.files[0]);

        for (const [event, hovering] of [['dragenter', true], ['dragover', true], ['dragleave', false], ['drop', false]]) {
            uploadArea.addEventListener(event, (e) => {
                e.preventDefault();
                uploadArea.classList.toggle('dragover', hovering);
                if (event === 'drop') {
                    pickSandwich(e.dataTransfer.files[0]);
                }
            });
        }

        function showReport(report) {
            advisories.innerHTML = '';
            for (const text of report.advisories) {
                const p = document.createElement('p');
                p.className = 'advisory';
                p.textContent = '⚠️ ' + text;
                advisories.appendChild(p);
            }

            if (!report.is_sandwich) {
                document.getElementById('observation').textContent = report.overall_analysis;
                rejected.style.display = 'block';
                return;
            }

            document.getElementById('score').textContent = report.score.toFixed(2);
            document.getElementById('scoreBox').classList.toggle('high-score', report.high_score);
            document.getElementById('overall').textContent = report.overall_analysis;
            document.getElementById('filling').textContent = report.filling_analysis;
            document.getElementById('comment').textContent = report.comment || '';
            document.getElementById('heatmap').src = 'data:image/png;base64,' + report.heatmap_png;
            verdict.style.display = 'block';
        }

        async function handleFile(file) {
            const reader = new FileReader();
            reader.onload = (e) => {
                previewImage.src = e.target.result;
                previewImage.hidden = false;
            };
            reader.readAsDataURL(file);

            loading.style.display = 'block';
            errorDiv.style.display = 'none';
            rejected.style.display = 'none';
            verdict.style.display = 'none';

            const formData = new FormData();
            formData.append('image', file);

            try {
                const response = await fetch('/upload', {
                    method: 'POST',
                    body: formData
                });

                const result = await response.json();
                if (!response.ok) {
                    throw new Error(result.error || 'Upload failed');
                }

                loading.style.display = 'none';
                showReport(result);
            } catch (error) {
                loading.style.display = 'none';
                errorDiv.textContent = 'Error: ' + error.message;
                errorDiv.style.display = 'block';
            }
        }
    </script>
</body>
</html>
        "#,
    )
}
