//! Extraction prompts for the vision and text LLM engines.
//!
//! Each prompt requests a fixed JSON schema; the response parser tolerates a
//! markdown fence around the payload. Prompts exist for English, Chinese and
//! Malay — the languages homework photos actually arrive in.

/// System prompt shared by every structured-extraction request.
pub const SYSTEM_PROMPT: &str = "You are an expert OCR system specialized in extracting homework information from images.
Your task is to:
1. Extract ALL text accurately from the homework image
2. Identify and structure the information into specific fields
3. Detect dates, subjects, and assignment details
4. Return ONLY valid JSON, no markdown formatting

Be precise and thorough. If information is unclear, mark it as such.";

const EXTRACTION_PROMPT_EN: &str = r#"Analyze this homework image and extract the following information in JSON format:

{
    "subject": "The school subject (Math, Science, English, etc.)",
    "title": "Brief title of the homework",
    "description": "Full description of what needs to be done",
    "due_date": "Due date as written in the image",
    "due_date_normalized": "Due date in YYYY-MM-DD format if detectable",
    "assignments": [
        {
            "task": "Individual task description",
            "page_numbers": "Page numbers if specified",
            "questions": "Specific questions to answer"
        }
    ],
    "materials_needed": ["List of materials required"],
    "estimated_time": "Estimated time to complete if mentioned",
    "priority": "Priority level: low, normal, high, or urgent",
    "homework_type": "One of: buku_teks, buku_latihan, worksheet, project, other",
    "homework_type_display": "Display name in the appropriate language",
    "potential_names": ["2-3 suggested homework titles based on the content"],
    "what_to_achieve": "Learning objectives in 1-2 sentences",
    "exercises_list": ["Specific exercises/questions found, e.g. 'Exercise 2.3'"],
    "page_numbers": "Page numbers mentioned (e.g. '45-47')",
    "textbook_title": "Name of textbook if mentioned",
    "workbook_title": "Name of workbook if mentioned"
}

Instructions:
- Extract ALL text visible in the image
- Identify the subject based on content
- Parse dates in various formats (e.g., "Due Friday", "Submit by 15/02/2026", etc.)
- Break down multiple assignments into the assignments array
- Return ONLY the JSON object, no additional text"#;

const EXTRACTION_PROMPT_ZH: &str = r#"分析这张作业图片，并以JSON格式提取以下信息：

{
    "subject": "学科（数学、科学、英语等）",
    "title": "作业简短标题",
    "description": "需要完成的完整描述",
    "due_date": "图片中写明的截止日期",
    "due_date_normalized": "可检测到的YYYY-MM-DD格式日期",
    "assignments": [
        {
            "task": "具体任务描述",
            "page_numbers": "页码（如有）",
            "questions": "需要回答的具体问题"
        }
    ],
    "materials_needed": ["所需材料清单"],
    "estimated_time": "提及的预计完成时间",
    "priority": "优先级：low, normal, high, 或 urgent",
    "homework_type": "类型之一：buku_teks, buku_latihan, worksheet, project, other",
    "homework_type_display": "以适当语言显示的类别名称",
    "potential_names": ["根据内容建议的2-3个作业标题"],
    "what_to_achieve": "用1-2句话描述学习目标",
    "exercises_list": ["找到的具体练习/问题列表"],
    "page_numbers": "提到的页码（例如：45-47）",
    "textbook_title": "如果提到课本名称",
    "workbook_title": "如果提到练习簿名称"
}

说明：
- 提取图片中所有可见文字
- 根据内容识别学科
- 解析各种日期格式
- 将多个作业分解到assignments数组
- 只返回JSON对象，不要其他文字"#;

const EXTRACTION_PROMPT_MS: &str = r#"Analisis gambar kerja rumah ini dan ekstrak maklumat berikut dalam format JSON:

{
    "subject": "Subjek sekolah (Matematik, Sains, Bahasa Inggeris, dll.)",
    "title": "Tajuk ringkas kerja rumah",
    "description": "Penerangan lengkap apa yang perlu dilakukan",
    "due_date": "Tarikh akhir seperti tertulis dalam gambar",
    "due_date_normalized": "Tarikh akhir dalam format YYYY-MM-DD jika dapat dikesan",
    "assignments": [
        {
            "task": "Penerangan tugas individu",
            "page_numbers": "Nombor halaman jika dinyatakan",
            "questions": "Soalan spesifik untuk dijawab"
        }
    ],
    "materials_needed": ["Senarai bahan yang diperlukan"],
    "estimated_time": "Anggaran masa untuk selesai jika disebut",
    "priority": "Tahap keutamaan: low, normal, high, atau urgent",
    "homework_type": "Salah satu: buku_teks, buku_latihan, worksheet, project, other",
    "homework_type_display": "Nama paparan dalam bahasa yang sesuai",
    "potential_names": ["2-3 tajuk kerja rumah yang dicadangkan"],
    "what_to_achieve": "Objektif pembelajaran dalam 1-2 ayat",
    "exercises_list": ["Latihan/soalan khusus yang dijumpai"],
    "page_numbers": "Nombor muka surat yang disebut (contoh: 45-47)",
    "textbook_title": "Nama buku teks jika disebut",
    "workbook_title": "Nama buku latihan jika disebut"
}

Arahan:
- Ekstrak SEMUA teks yang kelihatan dalam gambar
- Kenal pasti subjek berdasarkan kandungan
- Parse tarikh dalam pelbagai format
- Pecahkan tugas berbilang ke dalam array assignments
- Hanya kembalikan objek JSON, tiada teks tambahan"#;

/// Structured extraction prompt for a language hint (falls back to English).
pub fn extraction_prompt(language: &str) -> &'static str {
    match language {
        "zh" | "chi_sim" | "chi_tra" => EXTRACTION_PROMPT_ZH,
        "ms" | "msa" => EXTRACTION_PROMPT_MS,
        _ => EXTRACTION_PROMPT_EN,
    }
}

/// Prompt for structuring already-OCR'd (and already-redacted) text via a
/// text-only model.
pub fn text_extraction_prompt(language: &str, redacted_text: &str) -> String {
    format!(
        "{}\n\nExtract homework information from this OCR text:\n\n{}",
        extraction_prompt(language),
        redacted_text
    )
}
